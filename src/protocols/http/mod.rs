//! HTTP-like request/response protocol.
//!
//! One request per connection or datagram, no chunked encoding, no
//! keep-alive. Requests decode into [`HttpRequest`]; [`HttpResponse`] is the
//! [`Message`](crate::runtime::Message) handed back to the transport.

mod codec;
mod request;
mod response;

pub use codec::{decode, encode, ParseError};
pub use request::{HttpRequest, Method};
pub use response::{HttpResponse, StatusCode, CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
