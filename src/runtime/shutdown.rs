//! Shutdown signalling for acceptor loops, plus SIGINT/SIGTERM capture for
//! the binary.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static SIGNALLED: AtomicBool = AtomicBool::new(false);

/// Cloneable shutdown flag.
///
/// Acceptor loops check it once per poll interval, so a trigger takes
/// effect within one interval.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

extern "C" fn on_signal(_sig: libc::c_int) {
    SIGNALLED.store(true, Ordering::Release);
}

/// Record SIGINT and SIGTERM instead of terminating the process.
///
/// Poll [`signal_received`] to act on them.
pub fn install_signal_handlers() -> io::Result<()> {
    for sig in [libc::SIGINT, libc::SIGTERM] {
        // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
        let previous = unsafe { libc::signal(sig, on_signal as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

pub fn signal_received() -> bool {
    SIGNALLED.load(Ordering::Acquire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_visible_to_clones() {
        let shutdown = Shutdown::new();
        let observer = shutdown.clone();
        assert!(!observer.is_triggered());

        shutdown.trigger();
        assert!(observer.is_triggered());

        shutdown.trigger();
        assert!(observer.is_triggered());
    }

    #[test]
    fn test_sigterm_is_recorded() {
        install_signal_handlers().unwrap();
        // SAFETY: raising a signal whose handler is installed above.
        assert_eq!(unsafe { libc::raise(libc::SIGTERM) }, 0);
        assert!(signal_received());
    }
}
