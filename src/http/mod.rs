//! HTTP protocol layer module
//!
//! Response construction, decoupled from the format pipeline.

pub mod response;

pub use response::{build_404_response, build_json_response, build_text_response};
