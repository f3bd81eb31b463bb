//! Units of accepted work.
//!
//! A `Task` is created by an acceptor for every accepted connection or
//! received datagram and consumed by exactly one worker, which writes the
//! reply back through the task's transport.

use crate::runtime::TransportError;
use bytes::Bytes;
use std::io::Write;
use std::net::{self, SocketAddr, TcpStream, UdpSocket};
use std::sync::Arc;

/// Where a reply goes.
#[derive(Debug)]
pub enum Transport {
    /// Accepted connection, closed once the reply is written.
    Stream(TcpStream),
    /// Shared datagram socket; replies go to the task's peer.
    Datagram(Arc<UdpSocket>),
}

/// One accepted connection or datagram with its initial payload.
#[derive(Debug)]
pub struct Task {
    transport: Transport,
    peer: SocketAddr,
    payload: Bytes,
}

impl Task {
    pub fn stream(stream: TcpStream, peer: SocketAddr, payload: Bytes) -> Self {
        Self {
            transport: Transport::Stream(stream),
            peer,
            payload,
        }
    }

    pub fn datagram(socket: Arc<UdpSocket>, peer: SocketAddr, payload: Bytes) -> Self {
        Self {
            transport: Transport::Datagram(socket),
            peer,
            payload,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.transport, Transport::Stream(_))
    }

    /// Write `response` back to the peer, consuming the task.
    ///
    /// Stream transports are half-closed after the write and dropped, which
    /// closes the connection: one request per connection.
    pub fn reply(self, response: &[u8]) -> Result<usize, TransportError> {
        let peer = self.peer;
        let write_err = |source| TransportError::Write { peer, source };

        match self.transport {
            Transport::Stream(mut stream) => {
                stream.write_all(response).map_err(write_err)?;
                stream.flush().map_err(write_err)?;
                // Peer may already be gone; the reply is out either way.
                let _ = stream.shutdown(net::Shutdown::Write);
                Ok(response.len())
            }
            Transport::Datagram(socket) => socket.send_to(response, peer).map_err(write_err),
        }
    }
}
