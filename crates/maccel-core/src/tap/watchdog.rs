// Maccel Event Tap - Watchdog
// Periodic liveness check catching disables the OS never reported

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::driver::TapShared;

pub struct Watchdog {
    stop: Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    pub fn spawn(shared: Arc<TapShared>, interval: Duration) -> std::io::Result<Self> {
        let (stop, stopped) = bounded::<()>(1);
        let handle = std::thread::Builder::new()
            .name("maccel-watchdog".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => shared.check_liveness(),
                    _ => break,
                }
            })?;
        Ok(Self {
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop and join the thread. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop.try_send(());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                log::error!("Watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
