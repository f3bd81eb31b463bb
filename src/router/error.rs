//! Routing errors and their HTTP mapping.

use crate::protocols::http::{HttpResponse, Method, ParseError, StatusCode};
use thiserror::Error;

/// Malformed path template. Raised at registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("empty path template")]
    Empty,

    #[error("unbalanced braces in template {0:?}")]
    Unbalanced(String),

    #[error("empty placeholder name in template {0:?}")]
    EmptyName(String),

    #[error("invalid placeholder name {0:?}")]
    InvalidName(String),

    #[error("duplicate placeholder name {0:?}")]
    DuplicateName(String),
}

/// Merged parameters do not fit a route's declared shapes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required parameter '{param}'")]
    Missing { param: String },

    #[error("parameter '{param}' expected {expected}, got {found}")]
    Type {
        param: String,
        expected: String,
        found: String,
    },
}

impl ValidationError {
    /// Name (or path, e.g. `other[1]`) of the offending parameter.
    pub fn param(&self) -> &str {
        match self {
            ValidationError::Missing { param } | ValidationError::Type { param, .. } => param,
        }
    }
}

/// Failure reported by a handler. The message goes to the client verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<ValidationError> for HandlerError {
    fn from(e: ValidationError) -> Self {
        Self::new(e.to_string())
    }
}

/// Any reason a request did not reach a successful handler return.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    #[error("Bad endpoint")]
    NotFound { method: Method, path: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NotFound { .. } => StatusCode::NotFound,
            RouteError::Parse(_) | RouteError::Validation(_) | RouteError::Handler(_) => {
                StatusCode::BadRequest
            }
        }
    }

    /// Error envelope carrying this error's message and status.
    pub fn into_response(self) -> HttpResponse {
        HttpResponse::error(&self.to_string(), self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = RouteError::NotFound {
            method: Method::Get,
            path: "/nope".to_string(),
        };
        assert_eq!(not_found.status(), StatusCode::NotFound);
        assert_eq!(not_found.to_string(), "Bad endpoint");

        let parse = RouteError::from(ParseError::Empty);
        assert_eq!(parse.status(), StatusCode::BadRequest);
        assert_eq!(parse.to_string(), "malformed request: empty request");

        let handler = RouteError::from(HandlerError::new("Invalid ID"));
        assert_eq!(handler.status(), StatusCode::BadRequest);
        assert_eq!(handler.to_string(), "Invalid ID");
    }

    #[test]
    fn test_validation_messages_name_param() {
        let missing = ValidationError::Missing {
            param: "id".to_string(),
        };
        assert_eq!(missing.to_string(), "missing required parameter 'id'");
        assert_eq!(missing.param(), "id");

        let wrong = ValidationError::Type {
            param: "other[1]".to_string(),
            expected: "str".to_string(),
            found: "number".to_string(),
        };
        assert_eq!(wrong.to_string(), "parameter 'other[1]' expected str, got number");
        assert_eq!(HandlerError::from(wrong).message(), "parameter 'other[1]' expected str, got number");
    }

    #[test]
    fn test_into_response() {
        let response = RouteError::NotFound {
            method: Method::Delete,
            path: "/".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.body(), br#"{"status":"error","error":"Bad endpoint"}"#);
    }
}
