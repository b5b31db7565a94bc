//! JSON format pipeline
//!
//! Method check, body read, emptiness check, parse, re-serialize. The first
//! failing step decides the response.

use super::input;
use super::FormatError;
use crate::http;
use crate::logger;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use std::net::SocketAddr;

/// Path the formatter is mounted on
pub const FORMAT_JSON_PATH: &str = "/formatjson";

/// Turn one request into exactly one response
///
/// The body is only read for POST requests and is dropped on every exit path.
pub async fn format_json<B>(req: Request<B>, peer_addr: SocketAddr) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Display,
{
    match run_pipeline(req).await {
        Ok(json) => {
            logger::log_format_success(&peer_addr, json.len());
            http::build_json_response(json)
        }
        Err(err) => {
            log_failure(&peer_addr, &err);
            http::build_text_response(err.status(), err.message())
        }
    }
}

async fn run_pipeline<B>(req: Request<B>) -> Result<Vec<u8>, FormatError>
where
    B: Body,
    B::Error: Display,
{
    if req.method() != Method::POST {
        return Err(FormatError::MethodNotAllowed(req.method().clone()));
    }

    let body = read_body(req.into_body()).await?;
    pretty_print(&body)
}

async fn read_body<B>(body: B) -> Result<Bytes, FormatError>
where
    B: Body,
    B::Error: Display,
{
    body.collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| FormatError::ReadBody(e.to_string()))
}

/// Deepest array/object nesting accepted
pub const MAX_DEPTH: usize = 10_000;

/// Stack kept free before parsing, plus the share reserved per nesting level
const BASE_STACK: usize = 64 * 1024;
const STACK_PER_LEVEL: usize = 16 * 1024;

/// Re-encode a JSON document with 2-space indentation
///
/// Object keys come out sorted; array order is preserved. Invalid UTF-8 and
/// lone surrogate escapes decode to U+FFFD.
pub fn pretty_print(body: &[u8]) -> Result<Vec<u8>, FormatError> {
    if body.is_empty() {
        return Err(FormatError::EmptyBody);
    }

    let input = input::prepare(body);
    if input.depth > MAX_DEPTH {
        return Err(FormatError::TooDeep(input.depth));
    }

    // Parse, serialize and drop all recurse once per level
    let stack = BASE_STACK + input.depth * STACK_PER_LEVEL;
    stacker::maybe_grow(stack, stack, || reformat(&input.text))
}

fn reformat(text: &str) -> Result<Vec<u8>, FormatError> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de).map_err(FormatError::InvalidJson)?;
    de.end().map_err(FormatError::InvalidJson)?;

    serde_json::to_vec_pretty(&value).map_err(FormatError::Serialize)
}

fn log_failure(peer_addr: &SocketAddr, err: &FormatError) {
    match err {
        FormatError::MethodNotAllowed(method) => logger::log_method_rejected(peer_addr, method),
        FormatError::ReadBody(cause) => logger::log_body_read_failed(peer_addr, cause),
        FormatError::EmptyBody => logger::log_empty_body(peer_addr),
        FormatError::InvalidJson(cause) => logger::log_invalid_json(peer_addr, cause),
        FormatError::TooDeep(_) => logger::log_invalid_json(peer_addr, err),
        FormatError::Serialize(cause) => logger::log_format_failed(peer_addr, cause),
    }
}
