//! Protocol implementations.
//!
//! Each protocol plugs into the runtime as a [`Service`](crate::runtime::Service).
//!
//! - `http`: request/response codec for the HTTP-like wire format served by
//!   the [`Router`](crate::router::Router)
//! - `echo`: replies with the request bytes, for transport testing

pub mod echo;
pub mod http;
