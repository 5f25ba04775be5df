use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::writer::LoggerCore;
use crate::{Error, Result};

/// Background task that re-evaluates the rotation policy on a fixed cadence.
///
/// One monitor thread runs per logger. It is stopped and joined when the
/// monitor is dropped, so a logger never leaks its thread past its own
/// lifetime.
pub(crate) struct Monitor {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Monitor {
    pub(crate) fn spawn(core: Arc<LoggerCore>, interval: Duration) -> Result<Self> {
        let (stop, ticks) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("splitlog-monitor".to_string())
            .spawn(move || run(core, ticks, interval))
            .map_err(|err| Error::Init(format!("failed to spawn monitor thread: {}", err)))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the monitor thread to stop and wait for it to finish.
    pub(crate) fn stop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(core: Arc<LoggerCore>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        // A fault on one tick must never end future rotation checks.
        match panic::catch_unwind(AssertUnwindSafe(|| core.check_and_rotate())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(
                    error = %err,
                    path = %core.active_path().display(),
                    "rotation check failed"
                );
            }
            Err(_) => {
                tracing::error!(
                    path = %core.active_path().display(),
                    "rotation check panicked"
                );
            }
        }
    }
}
