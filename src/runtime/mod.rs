//! Transport runtime.
//!
//! Readiness-based accept loops (mio over epoll/kqueue) hand each accepted
//! connection or datagram to a fixed pool of worker threads:
//! - `SocketListener`: binds, polls with a bounded timeout, accepts
//! - `WorkerPool`: FIFO queue plus `N` workers, sentinel shutdown
//! - `Service`: the protocol seam, `&[u8]` in, `Message` out
//! - `Task`: one unit of work and the way back to its peer

mod addr;
mod error;
mod listener;
mod pool;
mod service;
mod shutdown;
mod task;

pub use addr::{Address, AddressParseError, IpVersion};
pub use error::TransportError;
pub use listener::{
    Accepted, Acceptor, ListenerHandle, ListenerOptions, SocketListener, TcpAcceptor, TcpListener,
    UdpAcceptor, UdpListener, POLL_INTERVAL,
};
pub use pool::WorkerPool;
pub use service::{Message, Service};
pub use shutdown::{install_signal_handlers, signal_received, Shutdown};
pub use task::{Task, Transport};
