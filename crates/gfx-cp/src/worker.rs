//! Background ring consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::error;

use crate::cp::GfxCp;
use crate::error::CpError;

/// Owns the consumer thread for one device.
///
/// The thread services both rings once per iteration and sleeps between
/// iterations; it is woken purely by time. A contract violation halts the
/// device permanently and stays readable through [`CpWorker::fault`].
pub struct CpWorker {
    stop: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<CpError>>>,
    thread: Option<JoinHandle<()>>,
}

impl CpWorker {
    /// Starts the consumer over `cp`, pausing the device's configured poll
    /// interval between iterations.
    pub fn spawn(cp: Arc<Mutex<GfxCp>>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let fault: Arc<Mutex<Option<CpError>>> = Arc::new(Mutex::new(None));
        let poll_interval = cp.lock().unwrap().config().poll_interval;

        let thread_stop = Arc::clone(&stop);
        let thread_fault = Arc::clone(&fault);
        let thread = thread::Builder::new()
            .name("gfx-cp".into())
            .spawn(move || {
                while !thread_stop.load(Ordering::Acquire) {
                    if let Err(err) = cp.lock().unwrap().tick() {
                        error!(%err, "command processor halted");
                        *thread_fault.lock().unwrap() = Some(err);
                        return;
                    }
                    thread::sleep(poll_interval);
                }
            })
            .expect("spawn gfx-cp consumer thread");

        Self {
            stop,
            fault,
            thread: Some(thread),
        }
    }

    /// The contract violation that halted the device, if any.
    pub fn fault(&self) -> Option<CpError> {
        self.fault.lock().unwrap().clone()
    }

    /// Whether the consumer thread is still live (it exits on stop or halt).
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signals the consumer to stop and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
