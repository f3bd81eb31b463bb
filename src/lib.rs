//! pakket: a small socket service framework.
//!
//! - `runtime`: TCP/UDP listeners feeding a fixed worker pool, with any
//!   [`Service`](runtime::Service) plugged in as the protocol
//! - `protocols`: the HTTP-style codec and an echo service
//! - `router`: path-template routing with typed parameter binding
//! - `demo`: the `/demo` endpoints served by the binary
//! - `config`: CLI and TOML configuration for the binary

pub mod config;
pub mod demo;
pub mod protocols;
pub mod router;
pub mod runtime;
