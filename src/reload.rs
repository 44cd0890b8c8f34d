//! Live-reload broker and its Server-Sent Events stream.
//!
//! Each browser tab holds one `Waiter`. A successful rebuild calls
//! [`LiveReloadBroker::notify_all`], which wakes every waiter registered at
//! that moment exactly once and forgets them; clients re-register after a
//! reload fires.
//!
//! Wire format of the stream:
//!
//! ```text
//! data: connected\n\n      once, right after the headers
//! : keepalive\n\n          every keepalive interval while idle
//! data: reload\n\n         once, then the stream ends
//! ```

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{
    io::{self, Write},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reload,
    Timeout,
    /// The broker dropped this waiter without a reload.
    Closed,
}

/// A registered client. Dropping it does not unregister; call
/// [`LiveReloadBroker::unregister`] or use [`stream`].
#[derive(Debug)]
pub struct Waiter {
    id: u64,
    rx: Receiver<()>,
}

#[derive(Debug, Default)]
pub struct LiveReloadBroker {
    waiters: Mutex<FxHashMap<u64, Sender<()>>>,
    next_id: AtomicU64,
}

impl LiveReloadBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> Waiter {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        self.waiters.lock().insert(id, tx);
        Waiter { id, rx }
    }

    /// Block until a reload arrives for `waiter` or `timeout` elapses.
    pub fn wait(&self, waiter: &Waiter, timeout: Duration) -> WaitOutcome {
        match waiter.rx.recv_timeout(timeout) {
            Ok(()) => WaitOutcome::Reload,
            Err(RecvTimeoutError::Timeout) => WaitOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Closed,
        }
    }

    /// Wake every current waiter once. Returns how many were woken.
    pub fn notify_all(&self) -> usize {
        let drained: Vec<_> = self.waiters.lock().drain().collect();
        drained
            .into_iter()
            .filter(|(_, tx)| match tx.try_send(()) {
                Ok(()) | Err(TrySendError::Full(())) => true,
                Err(TrySendError::Disconnected(())) => false,
            })
            .count()
    }

    /// Forget a waiter. Unknown or already-notified ids are ignored.
    pub fn unregister(&self, waiter: &Waiter) {
        self.waiters.lock().remove(&waiter.id);
    }

    /// Drop every waiter without a reload; blocked waits return `Closed`.
    pub fn close_all(&self) {
        self.waiters.lock().clear();
    }

    /// Clients currently waiting for a reload.
    pub fn clients(&self) -> usize {
        self.waiters.lock().len()
    }
}

/// Unregisters on every exit path, including write errors.
struct Registration<'a> {
    broker: &'a LiveReloadBroker,
    waiter: Waiter,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.broker.unregister(&self.waiter);
    }
}

/// Serve one SSE client until a reload is sent, the broker closes, or the
/// client goes away (surfaced as a write error).
pub fn stream<W: Write>(
    broker: &LiveReloadBroker,
    out: &mut W,
    keepalive: Duration,
) -> io::Result<()> {
    let registration = Registration {
        broker,
        waiter: broker.register(),
    };

    out.write_all(b"data: connected\n\n")?;
    out.flush()?;

    loop {
        match broker.wait(&registration.waiter, keepalive) {
            WaitOutcome::Reload => {
                out.write_all(b"data: reload\n\n")?;
                out.flush()?;
                return Ok(());
            }
            WaitOutcome::Timeout => {
                out.write_all(b": keepalive\n\n")?;
                out.flush()?;
            }
            WaitOutcome::Closed => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Instant};

    /// Fails every write once `budget` bytes have been accepted.
    struct BrokenPipe {
        written: Vec<u8>,
        budget: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.budget {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn wait_for_clients(broker: &LiveReloadBroker, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while broker.clients() < n && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(broker.clients(), n);
    }

    #[test]
    fn test_notify_wakes_each_waiter_once() {
        let broker = LiveReloadBroker::new();
        let waiters: Vec<_> = (0..3).map(|_| broker.register()).collect();

        assert_eq!(broker.notify_all(), 3);
        for waiter in &waiters {
            assert_eq!(broker.wait(waiter, Duration::ZERO), WaitOutcome::Reload);
            assert_eq!(
                broker.wait(waiter, Duration::from_millis(10)),
                WaitOutcome::Closed
            );
        }

        let late = broker.register();
        assert_eq!(
            broker.wait(&late, Duration::from_millis(20)),
            WaitOutcome::Timeout
        );
    }

    #[test]
    fn test_notify_counts() {
        let broker = LiveReloadBroker::new();
        let _a = broker.register();
        let _b = broker.register();
        let _c = broker.register();

        assert_eq!(broker.notify_all(), 3);
        assert_eq!(broker.notify_all(), 0);
        assert_eq!(broker.clients(), 0);
    }

    #[test]
    fn test_notify_skips_dropped_waiters() {
        let broker = LiveReloadBroker::new();
        let kept = broker.register();
        drop(broker.register());

        assert_eq!(broker.notify_all(), 1);
        assert_eq!(broker.wait(&kept, Duration::ZERO), WaitOutcome::Reload);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let broker = LiveReloadBroker::new();
        let waiter = broker.register();
        broker.unregister(&waiter);
        broker.unregister(&waiter);

        assert_eq!(broker.clients(), 0);
        assert_eq!(broker.notify_all(), 0);
    }

    #[test]
    fn test_close_all() {
        let broker = LiveReloadBroker::new();
        let waiter = broker.register();
        broker.close_all();
        assert_eq!(broker.wait(&waiter, Duration::from_secs(1)), WaitOutcome::Closed);
    }

    #[test]
    fn test_blocked_wait_is_woken() {
        let broker = Arc::new(LiveReloadBroker::new());
        let waiter = broker.register();

        let notifier = Arc::clone(&broker);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.notify_all()
        });

        assert_eq!(broker.wait(&waiter, Duration::from_secs(2)), WaitOutcome::Reload);
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_stream_sends_connected_then_reload() {
        let broker = Arc::new(LiveReloadBroker::new());
        let server = Arc::clone(&broker);
        let handle = thread::spawn(move || {
            let mut out = Vec::new();
            stream(&server, &mut out, Duration::from_secs(5)).unwrap();
            out
        });

        wait_for_clients(&broker, 1);
        assert_eq!(broker.notify_all(), 1);

        let out = handle.join().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "data: connected\n\ndata: reload\n\n"
        );
        assert_eq!(broker.clients(), 0);
    }

    #[test]
    fn test_stream_sends_keepalive_while_idle() {
        let broker = Arc::new(LiveReloadBroker::new());
        let server = Arc::clone(&broker);
        let handle = thread::spawn(move || {
            let mut out = Vec::new();
            stream(&server, &mut out, Duration::from_millis(20)).unwrap();
            out
        });

        wait_for_clients(&broker, 1);
        thread::sleep(Duration::from_millis(70));
        broker.notify_all();

        let out = String::from_utf8(handle.join().unwrap()).unwrap();
        assert!(out.starts_with("data: connected\n\n: keepalive\n\n"));
        assert!(out.ends_with("data: reload\n\n"));
    }

    #[test]
    fn test_stream_unregisters_on_write_error() {
        let broker = LiveReloadBroker::new();
        let mut pipe = BrokenPipe {
            written: Vec::new(),
            budget: b"data: connected\n\n".len(),
        };

        let err = stream(&broker, &mut pipe, Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(broker.clients(), 0);
    }
}
