//! Decoded requests.

use crate::protocols::http::ParseError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Request method. Only these four are routable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;

    /// Case-sensitive, as on the wire.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(ParseError::UnknownMethod(other.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request. Header keys are lower-cased; the body is always a JSON
/// object, empty when absent or not decodable.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    method: Method,
    headers: HashMap<String, String>,
    path: String,
    query: HashMap<String, String>,
    body: Map<String, Value>,
}

impl HttpRequest {
    pub fn new(
        method: Method,
        headers: HashMap<String, String>,
        path: impl Into<String>,
        query: HashMap<String, String>,
        body: Map<String, Value>,
    ) -> Self {
        Self {
            method,
            headers,
            path: path.into(),
            query,
            body,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}
