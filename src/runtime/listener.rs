//! Poll-driven socket listeners.
//!
//! Readiness model as in any mio loop: the bound socket is registered with a
//! `Poll`, and a readable event drains `accept`/`recv_from` until it would
//! block. Each accepted connection or received datagram becomes a [`Task`]
//! on the listener's own [`WorkerPool`].
//!
//! The poll waits at most [`POLL_INTERVAL`] so the loop can observe its
//! [`Shutdown`] flag; a timeout is not an error. TCP connections get exactly
//! one blocking read of at most `buffer_size` bytes on the acceptor thread
//! before being queued. Unless `read_timeout` is set that read has no
//! deadline, so a silent client stalls the acceptor.

use crate::runtime::{Address, Service, Shutdown, Task, TransportError, WorkerPool};
use bytes::Bytes;
use mio::net::{TcpListener as MioTcpListener, UdpSocket as MioUdpSocket};
use mio::{Events, Interest, Poll, Registry, Token};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Upper bound on how long the acceptor waits before re-checking shutdown.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const LISTENER_TOKEN: Token = Token(0);
const EVENT_CAPACITY: usize = 64;

/// Listener tuning.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    /// Worker threads in this listener's pool.
    pub workers: usize,
    /// Size of the single TCP read / UDP receive.
    pub buffer_size: usize,
    /// TCP listen backlog.
    pub backlog: i32,
    /// Deadline for the initial TCP read; `None` blocks.
    pub read_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            buffer_size: 8 * 1024,
            backlog: 100,
            read_timeout: None,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Outcome of one accept attempt.
pub enum Accepted {
    Task(Task),
    /// A unit arrived but was dropped (and logged) before becoming a task.
    Discarded,
    /// Nothing pending.
    Idle,
}

/// Transport-specific half of a [`SocketListener`].
pub trait Acceptor: Send + Sized + 'static {
    /// Short transport name used in logs and thread names.
    const KIND: &'static str;

    fn bind(addr: SocketAddr, options: &ListenerOptions) -> io::Result<Self>;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()>;

    /// Pull the next pending unit without blocking on the listening socket.
    fn accept(&mut self, buffer: &mut [u8], options: &ListenerOptions) -> io::Result<Accepted>;
}

/// Stream acceptor: one connection, one read, one task.
pub struct TcpAcceptor {
    listener: MioTcpListener,
}

impl Acceptor for TcpAcceptor {
    const KIND: &'static str = "tcp";

    fn bind(addr: SocketAddr, options: &ListenerOptions) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(options.backlog)?;

        let listener: std::net::TcpListener = socket.into();
        Ok(Self {
            listener: MioTcpListener::from_std(listener),
        })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.listener, token, Interest::READABLE)
    }

    fn accept(&mut self, buffer: &mut [u8], options: &ListenerOptions) -> io::Result<Accepted> {
        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Accepted::Idle),
            Err(e) => return Err(e),
        };

        // Back to a plain blocking stream for the read and the worker's reply.
        let mut stream = TcpStream::from(OwnedFd::from(stream));
        let read = stream
            .set_nonblocking(false)
            .and_then(|_| stream.set_read_timeout(options.read_timeout))
            .and_then(|_| stream.read(buffer));

        match read {
            Ok(0) => {
                debug!(peer = %peer, "Connection closed before sending data");
                Ok(Accepted::Discarded)
            }
            Ok(n) => {
                debug!(peer = %peer, bytes = n, "Accepted connection");
                let payload = Bytes::copy_from_slice(&buffer[..n]);
                Ok(Accepted::Task(Task::stream(stream, peer, payload)))
            }
            Err(source) => {
                let e = TransportError::Read { peer, source };
                warn!(error = %e, "Discarding connection");
                Ok(Accepted::Discarded)
            }
        }
    }
}

/// Datagram acceptor: one datagram, one task, replies via a shared clone of
/// the bound socket.
pub struct UdpAcceptor {
    socket: MioUdpSocket,
    reply: Arc<UdpSocket>,
}

impl Acceptor for UdpAcceptor {
    const KIND: &'static str = "udp";

    fn bind(addr: SocketAddr, _options: &ListenerOptions) -> io::Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;

        let socket: UdpSocket = socket.into();
        let reply = Arc::new(socket.try_clone()?);
        Ok(Self {
            socket: MioUdpSocket::from_std(socket),
            reply,
        })
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.socket, token, Interest::READABLE)
    }

    fn accept(&mut self, buffer: &mut [u8], _options: &ListenerOptions) -> io::Result<Accepted> {
        match self.socket.recv_from(buffer) {
            Ok((n, peer)) => {
                debug!(peer = %peer, bytes = n, "Received datagram");
                let payload = Bytes::copy_from_slice(&buffer[..n]);
                Ok(Accepted::Task(Task::datagram(
                    Arc::clone(&self.reply),
                    peer,
                    payload,
                )))
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Accepted::Idle),
            Err(e) => Err(e),
        }
    }
}

/// A bound socket, its poll, and the worker pool it feeds.
pub struct SocketListener<A: Acceptor> {
    acceptor: A,
    poll: Poll,
    pool: Arc<WorkerPool>,
    shutdown: Shutdown,
    local_addr: SocketAddr,
    options: ListenerOptions,
}

pub type TcpListener = SocketListener<TcpAcceptor>;
pub type UdpListener = SocketListener<UdpAcceptor>;

impl<A: Acceptor> SocketListener<A> {
    /// Bind `address` and start the worker pool for `service`.
    ///
    /// Nothing is accepted until [`run`](Self::run) or [`spawn`](Self::spawn).
    pub fn bind<S: Service>(
        address: &Address,
        service: Arc<S>,
        options: ListenerOptions,
    ) -> Result<Self, TransportError> {
        let addr = address.resolve()?;
        let bind_err = |source| TransportError::Bind { addr, source };

        let mut acceptor = A::bind(addr, &options).map_err(bind_err)?;
        let local_addr = acceptor.local_addr().map_err(bind_err)?;
        let poll = Poll::new().map_err(bind_err)?;
        acceptor
            .register(poll.registry(), LISTENER_TOKEN)
            .map_err(bind_err)?;

        let pool = Arc::new(WorkerPool::new(options.workers, service)?);

        info!(
            transport = A::KIND,
            addr = %local_addr,
            workers = pool.size(),
            "Listener bound"
        );

        Ok(Self {
            acceptor,
            poll,
            pool,
            shutdown: Shutdown::new(),
            local_addr,
            options,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops [`run`](Self::run) within one poll interval.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Accept on the calling thread until shutdown is triggered.
    pub fn run(&mut self) {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        let mut buffer = vec![0u8; self.options.buffer_size.max(1)];

        info!(transport = A::KIND, addr = %self.local_addr, "Accepting");

        // Set when a drain stopped on an error with units possibly still
        // queued; no new edge fires for those, so retry on the next timeout.
        let mut retry_pending = false;

        while !self.shutdown.is_triggered() {
            if let Err(e) = self.poll.poll(&mut events, Some(self.options.poll_interval)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(transport = A::KIND, error = %e, "Poll failed, stopping listener");
                break;
            }

            // Empty after a timeout.
            if events.is_empty() && !retry_pending {
                continue;
            }

            retry_pending = self.drain(&mut buffer);
        }

        info!(transport = A::KIND, addr = %self.local_addr, "Listener stopped");
    }

    /// Edge-triggered readiness: keep accepting until the socket is empty.
    ///
    /// Returns `true` when it gave up on an error before reaching empty.
    fn drain(&mut self, buffer: &mut [u8]) -> bool {
        loop {
            match self.acceptor.accept(buffer, &self.options) {
                Ok(Accepted::Task(task)) => self.dispatch(task),
                Ok(Accepted::Discarded) => {}
                Ok(Accepted::Idle) => return false,
                Err(e) if is_transient(&e) => {
                    warn!(transport = A::KIND, error = %e, "Transient accept error");
                }
                Err(e) => {
                    error!(
                        transport = A::KIND,
                        error = %e,
                        "Accept failed, retrying after the poll interval"
                    );
                    return true;
                }
            }
        }
    }

    fn dispatch(&self, task: Task) {
        let peer = task.peer();
        if let Err(e) = self.pool.submit(task) {
            error!(transport = A::KIND, peer = %peer, error = %e, "Discarding task");
        }
    }

    /// Move the accept loop onto its own thread.
    pub fn spawn(self) -> Result<ListenerHandle, TransportError> {
        let shutdown = self.shutdown.clone();
        let pool = Arc::clone(&self.pool);
        let local_addr = self.local_addr;

        let mut listener = self;
        let acceptor = thread::Builder::new()
            .name(format!("acceptor-{}", A::KIND))
            .spawn(move || listener.run())
            .map_err(TransportError::Spawn)?;

        Ok(ListenerHandle {
            shutdown,
            pool,
            local_addr,
            acceptor: Some(acceptor),
        })
    }

    /// Stop a listener that was driven with [`run`](Self::run): flag
    /// shutdown, release the socket and drain the pool.
    pub fn close(self) {
        self.shutdown.trigger();
        self.pool.close();
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::Interrupted
    )
}

/// A listener running on its own acceptor thread.
///
/// Dropping the handle closes it.
pub struct ListenerHandle {
    shutdown: Shutdown,
    pool: Arc<WorkerPool>,
    local_addr: SocketAddr,
    acceptor: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Whether the acceptor thread has exited.
    pub fn is_finished(&self) -> bool {
        self.acceptor.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait until some clone of the shutdown handle fires, then drain the pool.
    pub fn join(mut self) {
        self.join_acceptor();
        self.pool.close();
    }

    /// Flag shutdown, join the acceptor thread, then close the pool.
    pub fn close(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.trigger();
        self.join_acceptor();
        self.pool.close();
    }

    fn join_acceptor(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            if acceptor.join().is_err() {
                error!("Acceptor thread panicked");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
