//! Failure outcomes of the format pipeline and their HTTP mapping

use hyper::{Method, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),
    #[error("failed to read request body: {0}")]
    ReadBody(String),
    #[error("request body is empty")]
    EmptyBody,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("nesting depth {0} exceeds the limit")]
    TooDeep(usize),
    #[error("failed to serialize JSON: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl FormatError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::ReadBody(_) | Self::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmptyBody | Self::InvalidJson(_) | Self::TooDeep(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Plain-text body sent to the client
    pub fn message(&self) -> String {
        match self {
            Self::MethodNotAllowed(_) => "Invalid request method. Only POST is allowed.".to_string(),
            Self::ReadBody(_) => "Error reading request body".to_string(),
            Self::EmptyBody => "Empty request body".to_string(),
            Self::InvalidJson(e) => format!("Invalid JSON provided: {e}"),
            Self::TooDeep(_) => "Invalid JSON provided: exceeded max depth".to_string(),
            Self::Serialize(_) => "Error formatting JSON".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            FormatError::MethodNotAllowed(Method::GET).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            FormatError::ReadBody("reset".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(FormatError::EmptyBody.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_json_message_carries_parser_detail() {
        let parse_err = serde_json::from_str::<serde_json::Value>("[1,").unwrap_err();
        let detail = parse_err.to_string();
        let err = FormatError::InvalidJson(parse_err);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), format!("Invalid JSON provided: {detail}"));
    }

    #[test]
    fn test_too_deep_is_a_client_error() {
        let err = FormatError::TooDeep(10_001);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Invalid JSON provided: exceeded max depth");
    }
}
