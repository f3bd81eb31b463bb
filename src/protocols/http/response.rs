//! Responses and status codes.

use crate::protocols::http::encode;
use crate::runtime::Message;
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::error;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Supported status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Created,
    NoContent,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    InternalServerError,
    NotImplemented,
}

impl StatusCode {
    pub fn code(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
            StatusCode::NotImplemented => 501,
        }
    }

    /// Reason phrase for the status line.
    pub fn reason(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code())
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

#[derive(Serialize)]
struct Success<'a, T: Serialize> {
    status: &'static str,
    data: &'a T,
}

#[derive(Serialize)]
struct Failure<'a> {
    status: &'static str,
    error: &'a str,
}

/// A response ready for [`encode`]. `Content-Length` is owned by the
/// encoder and never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: StatusCode,
    headers: BTreeMap<String, String>,
    body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// `{"status":"ok","data":<data>}` with the given status.
    pub fn ok<T: Serialize>(data: T, status: StatusCode) -> Self {
        let envelope = Success {
            status: "ok",
            data: &data,
        };
        match serde_json::to_vec(&envelope) {
            Ok(body) => Self::json(status, body),
            Err(e) => {
                error!(error = %e, "Failed to serialize response data");
                Self::error("response serialization failed", StatusCode::InternalServerError)
            }
        }
    }

    /// `{"status":"error","error":<message>}` with the given status.
    pub fn error(message: &str, status: StatusCode) -> Self {
        let envelope = Failure {
            status: "error",
            error: message,
        };
        // A struct of two strings always serializes.
        let body = serde_json::to_vec(&envelope).unwrap_or_default();
        Self::json(status, body)
    }

    /// Plain-text body.
    pub fn text(body: impl Into<String>, status: StatusCode) -> Self {
        Self::new(status, body.into()).with_header("Content-Type", CONTENT_TYPE_TEXT)
    }

    fn json(status: StatusCode, body: Vec<u8>) -> Self {
        Self::new(status, body).with_header("Content-Type", CONTENT_TYPE_JSON)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl Message for HttpResponse {
    fn to_bytes(&self) -> Bytes {
        encode(self)
    }
}
