//! Fixed-size worker pool.
//!
//! `N` named threads drain one shared FIFO queue. Each task is handed to the
//! pool's [`Service`], and the serialized reply is written back through the
//! task's transport by the same worker.
//!
//! ## Shutdown
//!
//! `close` pushes exactly one stop sentinel per worker behind whatever is
//! already queued, then joins every thread. Queued tasks are therefore
//! drained before the workers exit. There is no join timeout: a worker stuck
//! inside `Service::call` keeps `close` waiting.

use crate::runtime::{Message, Service, Task, TransportError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, trace, warn};

enum Job {
    Run(Task),
    Stop,
}

/// Bounded set of worker threads fed by a blocking queue.
pub struct WorkerPool {
    /// `None` once the pool is closed.
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Start `size` workers (at least one) serving `service`.
    pub fn new<S: Service>(size: usize, service: Arc<S>) -> Result<Self, TransportError> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for worker_id in 0..size {
            let receiver = Arc::clone(&receiver);
            let service = Arc::clone(&service);

            // On failure the sender is dropped and already-started workers exit.
            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &receiver, service.as_ref()))
                .map_err(TransportError::Spawn)?;

            workers.push(handle);
        }

        info!(workers = size, "Worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a task. Fails with `PoolClosed` after [`close`](Self::close);
    /// the task is dropped in that case, closing its connection.
    pub fn submit(&self, task: Task) -> Result<(), TransportError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => sender
                .send(Job::Run(task))
                .map_err(|_| TransportError::PoolClosed),
            None => Err(TransportError::PoolClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting tasks, let workers drain the queue, and join them.
    ///
    /// Idempotent. Must not be called from a worker thread.
    pub fn close(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return;
        };

        for _ in 0..self.size {
            // Only fails if every worker is already gone.
            let _ = sender.send(Job::Stop);
        }
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in workers {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }

        info!(workers = self.size, "Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop<S: Service>(worker_id: usize, receiver: &Mutex<Receiver<Job>>, service: &S) {
    debug!(worker = worker_id, "Worker started");

    loop {
        // Hold the lock only while waiting for the next job.
        let job = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };

        match job {
            Ok(Job::Run(task)) => process(worker_id, task, service),
            Ok(Job::Stop) | Err(_) => break,
        }
    }

    debug!(worker = worker_id, "Worker stopped");
}

fn process<S: Service>(worker_id: usize, task: Task, service: &S) {
    let peer = task.peer();

    let response = match panic::catch_unwind(AssertUnwindSafe(|| {
        service.call(task.payload()).to_bytes()
    })) {
        Ok(response) => response,
        Err(_) => {
            error!(worker = worker_id, peer = %peer, "Service panicked, dropping task");
            return;
        }
    };

    match task.reply(&response) {
        Ok(written) => trace!(worker = worker_id, peer = %peer, bytes = written, "Reply sent"),
        Err(e) => warn!(worker = worker_id, error = %e, "Failed to send reply"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::UdpSocket;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and remembers payloads; panics on `boom`.
    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<u8>>>,
    }

    impl Service for Recorder {
        type Message = Bytes;

        fn call(&self, request: &[u8]) -> Bytes {
            if request == b"boom" {
                panic!("boom");
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.to_vec());
            Bytes::from_static(b"ok")
        }
    }

    fn datagram_task(reply: &Arc<UdpSocket>, sink: &UdpSocket, payload: Vec<u8>) -> Task {
        Task::datagram(
            Arc::clone(reply),
            sink.local_addr().unwrap(),
            Bytes::from(payload),
        )
    }

    fn sockets() -> (Arc<UdpSocket>, UdpSocket) {
        let reply = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let sink = UdpSocket::bind("127.0.0.1:0").unwrap();
        (reply, sink)
    }

    #[test]
    fn test_each_task_runs_exactly_once() {
        let service = Arc::new(Recorder::default());
        let pool = WorkerPool::new(4, Arc::clone(&service)).unwrap();
        let (reply, sink) = sockets();

        for i in 0..50u32 {
            pool.submit(datagram_task(&reply, &sink, i.to_string().into_bytes()))
                .unwrap();
        }
        pool.close();

        assert_eq!(service.calls.load(Ordering::SeqCst), 50);
        let mut seen: Vec<u32> = service
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|p| String::from_utf8(p.clone()).unwrap().parse().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_close_with_no_tasks() {
        let service = Arc::new(Recorder::default());
        let pool = WorkerPool::new(3, Arc::clone(&service)).unwrap();
        assert_eq!(pool.size(), 3);

        pool.close();
        assert!(pool.is_closed());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let pool = WorkerPool::new(0, Arc::new(Recorder::default())).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_submit_after_close_fails() {
        let pool = WorkerPool::new(2, Arc::new(Recorder::default())).unwrap();
        let (reply, sink) = sockets();

        pool.close();
        pool.close();

        let err = pool
            .submit(datagram_task(&reply, &sink, b"late".to_vec()))
            .unwrap_err();
        assert!(matches!(err, TransportError::PoolClosed));
    }

    #[test]
    fn test_service_panic_keeps_worker_alive() {
        let service = Arc::new(Recorder::default());
        let pool = WorkerPool::new(1, Arc::clone(&service)).unwrap();
        let (reply, sink) = sockets();

        pool.submit(datagram_task(&reply, &sink, b"boom".to_vec()))
            .unwrap();
        pool.submit(datagram_task(&reply, &sink, b"after".to_vec()))
            .unwrap();
        pool.close();

        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.seen.lock().unwrap()[0], b"after");
    }
}
