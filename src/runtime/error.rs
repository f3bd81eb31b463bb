//! Transport-level errors.

use crate::runtime::IpVersion;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Socket failures. Bind-time variants are fatal to startup; the per-task
/// ones abort a single connection or datagram and are only logged.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve {host:?}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no {version:?} address available for {host:?}")]
    AddressFamily { host: String, version: IpVersion },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to read from {peer}: {source}")]
    Read {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to write to {peer}: {source}")]
    Write {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("worker pool is closed")]
    PoolClosed,
}
