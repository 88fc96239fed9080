use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Cooperative stop request shared between an owner and its background thread.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` unless stopped first.
    /// Returns true if the signal was raised.
    /// A duration too large to represent as an instant waits for the signal only.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let Some(deadline) = deadline else {
                stopped = self.wake.wait(stopped).unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            stopped = self
                .wake
                .wait_timeout(stopped, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *stopped
    }
}

/// A named thread that runs until its [`StopSignal`] is raised.
///
/// Shutting down never interrupts the thread: it raises the signal and joins,
/// so the body must return promptly once `is_stopped()` turns true.
pub struct BackgroundTask {
    name: String,
    signal: Arc<StopSignal>,
    thread: Option<thread::JoinHandle<()>>,
}

impl BackgroundTask {
    pub fn spawn<F>(name: &str, body: F) -> io::Result<BackgroundTask>
    where
        F: FnOnce(Arc<StopSignal>) + Send + 'static,
    {
        let signal = Arc::new(StopSignal::new());
        let task_signal = signal.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(task_signal))?;

        Ok(BackgroundTask {
            name: name.to_string(),
            signal,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Request a stop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.signal.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!(target: "ssdp::runtime", "background task '{}' panicked", self.name);
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
