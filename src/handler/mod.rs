//! Request handler module
//!
//! Routes requests to the JSON format pipeline.

pub mod error;
pub mod formatter;
mod input;
pub mod router;

pub use error::FormatError;
pub use router::handle_request;
