//! Wire format.
//!
//! Request framing:
//!
//! ```text
//! <METHOD> <PATH>[?<QUERY>] <VERSION>\r\n
//! <Header-Key>: <Header-Value>\r\n     (zero or more)
//! \r\n
//! <body, JSON when present>
//! ```
//!
//! Exactly one request per payload. Decoding is strict about the start line
//! and headers but permissive about the body: anything that is not a JSON
//! object decodes as an empty one.

use crate::protocols::http::{HttpRequest, HttpResponse, Method};
use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

const HEAD_END: &[u8] = b"\r\n\r\n";
const VERSION: &str = "HTTP/1.1";

/// Structural decode failures. Always answered with 400.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty request")]
    Empty,

    #[error("malformed start line {0:?}")]
    MalformedStartLine(String),

    #[error("unknown method {0:?}")]
    UnknownMethod(String),

    #[error("malformed header line {0:?}")]
    MalformedHeader(String),
}

/// Decode one request.
pub fn decode(raw: &[u8]) -> Result<HttpRequest, ParseError> {
    let (head, body) = split_head(raw);
    let head = String::from_utf8_lossy(head);
    let mut lines = head.lines();

    let start = lines.next().filter(|l| !l.trim().is_empty()).ok_or(ParseError::Empty)?;
    let (method, target) = parse_start_line(start)?;
    let (path, query) = parse_target(target);

    let mut headers = HashMap::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedHeader(line.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::MalformedHeader(line.to_string()));
        }
        // Last occurrence wins.
        headers.insert(key.to_ascii_lowercase(), value.trim().to_string());
    }

    Ok(HttpRequest::new(
        method,
        headers,
        path,
        query,
        parse_body(body),
    ))
}

/// Serialize a response: status line, headers, `Content-Length`, blank
/// line, body. Any caller-supplied `Content-Length` is replaced.
pub fn encode(response: &HttpResponse) -> Bytes {
    let status = response.status();
    let body = response.body();

    let mut buf = BytesMut::with_capacity(128 + body.len());
    buf.put_slice(format!("{VERSION} {} {}\r\n", status.code(), status.reason()).as_bytes());

    for (key, value) in response.headers() {
        if key.eq_ignore_ascii_case("content-length") {
            continue;
        }
        buf.put_slice(key.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    buf.put_slice(body);

    buf.freeze()
}

/// Split at the first blank line. Without one the whole input is head.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    match raw.windows(HEAD_END.len()).position(|w| w == HEAD_END) {
        Some(pos) => (&raw[..pos], &raw[pos + HEAD_END.len()..]),
        None => (raw, &raw[raw.len()..]),
    }
}

fn parse_start_line(line: &str) -> Result<(Method, &str), ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    match parts.as_slice() {
        [method, target, version]
            if !method.is_empty() && !target.is_empty() && !version.is_empty() =>
        {
            Ok((method.parse()?, *target))
        }
        _ => Err(ParseError::MalformedStartLine(line.to_string())),
    }
}

/// Split a request target into path and decoded query. Accepts origin-form
/// (`/p?q`) and absolute-form (`http://host/p?q`); fragments are dropped.
fn parse_target(target: &str) -> (String, HashMap<String, String>) {
    let target = target.split_once('#').map_or(target, |(t, _)| t);

    let target = match target.find("://") {
        Some(scheme_end) => {
            let rest = &target[scheme_end + 3..];
            rest.find(|c: char| c == '/' || c == '?').map_or("/", |i| &rest[i..])
        }
        None => target,
    };

    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let path = if path.is_empty() { "/" } else { path };
    (path.to_string(), parse_query(query))
}

/// `application/x-www-form-urlencoded` pairs. Blank values are dropped and
/// the first value of a repeated key wins.
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(key);
        let value = decode_component(value);
        if key.is_empty() || value.is_empty() {
            continue;
        }
        params.entry(key).or_insert(value);
    }
    params
}

fn decode_component(component: &str) -> String {
    let spaced = component.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| {
            String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
        })
}

fn parse_body(body: &[u8]) -> Map<String, Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Map::new();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            debug!(kind = json_kind(&other), "Ignoring non-object request body");
            Map::new()
        }
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable request body");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_decode_get() {
        let raw = b"GET /demo/1?x=1&y=two HTTP/1.1\r\nHost: localhost\r\nX-Trace: abc\r\n\r\n";
        let request = decode(raw).unwrap();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/demo/1");
        assert_eq!(request.query().get("x").map(String::as_str), Some("1"));
        assert_eq!(request.query().get("y").map(String::as_str), Some("two"));
        assert_eq!(request.header("host"), Some("localhost"));
        assert_eq!(request.header("x-trace"), Some("abc"));
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_decode_json_body() {
        let raw = b"POST /demo HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"id\":1,\"other\":[\"a\"]}";
        let request = decode(raw).unwrap();

        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.body().get("id"), Some(&json!(1)));
        assert_eq!(request.body().get("other"), Some(&json!(["a"])));
    }

    #[test]
    fn test_decode_invalid_body_is_empty() {
        let request = decode(b"POST /demo HTTP/1.1\r\n\r\n{not json").unwrap();
        assert!(request.body().is_empty());

        let request = decode(b"POST /demo HTTP/1.1\r\n\r\n[1, 2]").unwrap();
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_decode_without_blank_line() {
        let request = decode(b"DELETE /demo/1 HTTP/1.1").unwrap();
        assert_eq!(request.method(), Method::Delete);
        assert_eq!(request.path(), "/demo/1");
    }

    #[test]
    fn test_decode_headers_lowercase_last_wins() {
        let raw = b"GET / HTTP/1.1\r\nX-Dup: one\r\nx-dup: two\r\nAuth: a:b:c\r\n\r\n";
        let request = decode(raw).unwrap();

        assert_eq!(request.headers().len(), 2);
        assert_eq!(request.header("X-DUP"), Some("two"));
        assert_eq!(request.header("auth"), Some("a:b:c"));
    }

    #[test]
    fn test_decode_query_rules() {
        let raw = b"GET /search?q=hello+world&tag=a%2Fb&q=ignored&blank=&flag HTTP/1.1\r\n\r\n";
        let request = decode(raw).unwrap();
        let query = request.query();

        assert_eq!(query.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(query.get("tag").map(String::as_str), Some("a/b"));
        assert!(!query.contains_key("blank"));
        assert!(!query.contains_key("flag"));
    }

    #[test]
    fn test_decode_absolute_target() {
        let request = decode(b"GET http://localhost:1234/demo/3?x=1#frag HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.path(), "/demo/3");
        assert_eq!(request.query().get("x").map(String::as_str), Some("1"));

        let request = decode(b"GET http://localhost HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(request.path(), "/");
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode(b""), Err(ParseError::Empty));
        assert_eq!(decode(b"\r\n\r\n"), Err(ParseError::Empty));
        assert!(matches!(
            decode(b"GET /demo\r\n\r\n"),
            Err(ParseError::MalformedStartLine(_))
        ));
        assert!(matches!(
            decode(b"GET  /demo HTTP/1.1\r\n\r\n"),
            Err(ParseError::MalformedStartLine(_))
        ));
        assert_eq!(
            decode(b"PATCH /demo HTTP/1.1\r\n\r\n"),
            Err(ParseError::UnknownMethod("PATCH".to_string()))
        );
        assert!(matches!(
            decode(b"GET / HTTP/1.1\r\nno colon here\r\n\r\n"),
            Err(ParseError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_encode() {
        let response = HttpResponse::error("Bad endpoint", StatusCode::NotFound);
        let encoded = encode(&response);

        let body = br#"{"status":"error","error":"Bad endpoint"}"#;
        let mut expected = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
            body.len()
        )
        .into_bytes();
        expected.extend_from_slice(body);
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn test_encode_overrides_content_length() {
        let response = HttpResponse::new(StatusCode::Ok, "abc").with_header("content-length", "99");
        let encoded = encode(&response);

        assert_eq!(&encoded[..], b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc");
    }

    #[test]
    fn test_encoded_response_decodes_back() {
        // Responses and requests share the head/body framing.
        let response = HttpResponse::ok(json!({"id": 7}), StatusCode::Created)
            .with_header("X-Request", "42");
        let encoded = encode(&response);

        let (head, body) = split_head(&encoded);
        let head = String::from_utf8_lossy(head);
        let mut lines = head.lines();
        assert_eq!(lines.next(), Some("HTTP/1.1 201 Created"));
        let headers: Vec<&str> = lines.collect();
        assert!(headers.contains(&"X-Request: 42"));
        assert!(headers.contains(&format!("Content-Length: {}", body.len()).as_str()));
        assert_eq!(body, response.body());
    }
}
