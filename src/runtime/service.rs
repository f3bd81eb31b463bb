//! The seam between transport and protocol.
//!
//! Listeners and workers only move bytes. Whatever speaks a protocol
//! implements [`Service`] and is injected at listener construction.

use bytes::Bytes;

/// A reply that can be put on the wire.
pub trait Message {
    fn to_bytes(&self) -> Bytes;
}

impl Message for Bytes {
    fn to_bytes(&self) -> Bytes {
        self.clone()
    }
}

impl Message for Vec<u8> {
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

/// Turns one request payload into one reply.
///
/// Called concurrently from every worker thread, so implementations must be
/// `Sync`; shared state is expected to be read-only or internally locked.
pub trait Service: Send + Sync + 'static {
    type Message: Message;

    fn call(&self, request: &[u8]) -> Self::Message;
}
