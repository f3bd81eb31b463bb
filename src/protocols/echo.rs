//! Echo service.
//!
//! Replies with exactly the bytes it received. No framing, no state.

use crate::runtime::Service;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Service for Echo {
    type Message = Bytes;

    fn call(&self, request: &[u8]) -> Bytes {
        Bytes::copy_from_slice(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        assert_eq!(Echo.call(b"hello\r\n"), Bytes::from_static(b"hello\r\n"));
        assert!(Echo.call(b"").is_empty());
    }
}
