//! Background worker threads with cooperative shutdown.
//!
//! Each loop owns a [`StopSignal`] and sleeps on it between iterations, so a
//! stop request wakes it immediately instead of waiting out the poll period.
//! Shutdown waits a bounded time for the thread and detaches it after that.

use log::{debug, error, warn};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between checks while waiting for a worker to exit.
const JOIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_flag(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn stop(&self) {
        *self.lock_flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.lock_flag()
    }

    /// Sleep for `timeout` or until stopped. Returns true if stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.lock_flag();
        let (guard, _) = self
            .inner
            .1
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|p| p.into_inner());
        *guard
    }
}

/// Run `tick` every `period` until `stop` fires.
///
/// A panic inside `tick` is logged and the loop carries on with the next
/// iteration.
pub fn run_periodic<F>(name: &str, stop: &StopSignal, period: Duration, mut tick: F)
where
    F: FnMut(),
{
    debug!("{name}: loop started (period {period:?})");
    while !stop.is_stopped() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| tick())) {
            error!("{name}: iteration panicked: {}", panic_message(payload.as_ref()));
        }
        if stop.wait_timeout(period) {
            break;
        }
    }
    debug!("{name}: loop stopped");
}

pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// A named background thread and the signal that stops it.
pub struct Worker {
    name: String,
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let stop = StopSignal::new();
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name(format!("saveguard-{name}"))
            .spawn(move || body(thread_stop))?;

        Ok(Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop without waiting for it.
    pub fn request_stop(&self) {
        self.stop.stop();
    }

    /// Request a stop and wait up to `timeout` for the thread to exit.
    ///
    /// Returns false if the thread was still running at the deadline; it is
    /// detached in that case.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.stop.stop();
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("{}: did not stop within {timeout:?}, detaching", self.name);
                return false;
            }
            thread::sleep(JOIN_POLL);
        }

        if let Err(payload) = handle.join() {
            error!("{}: thread panicked: {}", self.name, panic_message(payload.as_ref()));
        }
        true
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_wait_timeout_returns_false_when_not_stopped() {
        let stop = StopSignal::new();
        assert!(!stop.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_stop_wakes_waiter() {
        let stop = StopSignal::new();
        let waiter = stop.clone();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let stopped = waiter.wait_timeout(Duration::from_secs(30));
            (stopped, started.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        stop.stop();

        let (stopped, elapsed) = handle.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_worker_starts_and_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = Worker::spawn("test", move |stop| {
            run_periodic("test", &stop, Duration::from_millis(5), || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        })
        .unwrap();

        assert!(worker.is_running());
        thread::sleep(Duration::from_millis(50));
        assert!(worker.shutdown(Duration::from_secs(3)));
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_shutdown_gives_up_after_timeout() {
        let release = StopSignal::new();
        let gate = release.clone();
        // Ignores its own stop signal until released
        let worker = Worker::spawn("stuck", move |_stop| {
            gate.wait_timeout(Duration::from_secs(30));
        })
        .unwrap();

        let started = Instant::now();
        assert!(!worker.shutdown(Duration::from_millis(50)));
        assert!(started.elapsed() < Duration::from_secs(5));
        release.stop();
    }

    #[test]
    fn test_loop_survives_panicking_iteration() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let worker = Worker::spawn("flaky", move |stop| {
            run_periodic("flaky", &stop, Duration::from_millis(2), || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                assert!(n != 0, "first iteration fails");
            });
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(worker.shutdown(Duration::from_secs(3)));
        assert!(ticks.load(Ordering::SeqCst) > 1);
    }
}
