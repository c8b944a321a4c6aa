// Maccel Event Tap
// Creation, self-healing and teardown of a system-wide keyboard tap

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use super::backend::{EventMask, InstallError, TapBackend, TapError, TapPort};
use super::driver::{TapDriver, TapShared};
use super::listener::EventListener;
use super::state::{EngineNotice, TapState};
use super::watchdog::Watchdog;
use crate::output::ActionQueue;
use crate::{RemappingTable, SharedTable};

/// Tunables for tap creation and recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapConfig {
    pub mask: EventMask,
    /// Consecutive refused re-enables before the owner is told
    pub reenable_limit: u32,
    /// Pause before the single retry of a failed creation
    pub create_retry_delay: Duration,
    /// Liveness poll period; `None` disables the watchdog
    pub watchdog_interval: Option<Duration>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            mask: EventMask::KEYBOARD,
            reenable_limit: 3,
            create_retry_delay: Duration::from_millis(250),
            watchdog_interval: Some(Duration::from_secs(1)),
        }
    }
}

/// Everything a tap is wired to besides its listener
#[derive(Clone, Default)]
pub struct TapOptions {
    pub config: TapConfig,
    /// Table that [`EventTap::publish`] replaces
    pub table: SharedTable,
    /// Where synthetic posts requested by the listener go
    pub actions: Option<ActionQueue>,
    pub notices: Option<Sender<EngineNotice>>,
}

/// An installed event tap.
///
/// Dropping it destroys the tap.
pub struct EventTap {
    shared: Arc<TapShared>,
    port: Arc<dyn TapPort>,
    table: SharedTable,
    watchdog: Option<Watchdog>,
}

impl EventTap {
    /// Install a tap through `backend`.
    ///
    /// A resource failure is retried once after `create_retry_delay`;
    /// a permission failure is returned straight away.
    pub fn create<B>(
        backend: &mut B,
        listener: Box<dyn EventListener>,
        options: TapOptions,
    ) -> Result<Self, TapError>
    where
        B: TapBackend + ?Sized,
    {
        let TapOptions {
            config,
            table,
            actions,
            notices,
        } = options;

        let shared = Arc::new(TapShared::new(config.reenable_limit, notices));
        let actions = actions.unwrap_or_else(ActionQueue::detached);
        let mut driver = TapDriver::new(listener, shared.clone(), actions);

        let mut attempt = 1;
        let port = loop {
            match backend.install(config.mask, driver) {
                Ok(port) => break port,
                Err(InstallError { error, driver: returned }) => match returned {
                    Some(returned) if error.is_retryable() && attempt < 2 => {
                        log::warn!(
                            "{}; retrying in {}ms",
                            error,
                            config.create_retry_delay.as_millis()
                        );
                        std::thread::sleep(config.create_retry_delay);
                        attempt += 1;
                        driver = returned;
                    }
                    _ => {
                        log::error!("{}", error);
                        return Err(error);
                    }
                },
            }
        };

        shared.attach(port.clone());
        if !shared
            .status()
            .transition(&[TapState::Inactive], TapState::Active)
        {
            // the OS disabled it before we finished wiring up
            shared.reenable();
        }

        let watchdog = config.watchdog_interval.and_then(|interval| {
            Watchdog::spawn(shared.clone(), interval)
                .map_err(|e| log::warn!("Watchdog not started: {}", e))
                .ok()
        });

        log::info!("Event tap installed ({:?})", config.mask);
        Ok(Self {
            shared,
            port,
            table,
            watchdog,
        })
    }

    pub fn state(&self) -> TapState {
        self.shared.state()
    }

    /// True while the OS delivers events to the tap
    pub fn is_active(&self) -> bool {
        self.state() == TapState::Active
    }

    /// Ask the OS to resume delivery; true once active again
    pub fn reenable(&self) -> bool {
        self.shared.reenable()
    }

    /// Swap in a new table. The next event sees it; the one in flight does not.
    pub fn publish(&self, table: RemappingTable) {
        log::debug!("Publishing remapping table ({} entries)", table.len());
        self.table.store(table);
    }

    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    /// Consecutive refused re-enables since the last success
    pub fn reenable_failures(&self) -> u32 {
        self.shared.reenable_failures()
    }

    /// Stop interception and release the tap. Idempotent, callable from any thread.
    pub fn destroy(&self) {
        if !self.shared.status().destroy() {
            return;
        }
        if let Some(watchdog) = &self.watchdog {
            watchdog.stop();
        }
        self.port.remove();
        log::info!("Event tap destroyed");
    }
}

impl Drop for EventTap {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedBackend;
    use crate::tap::TapVerdict;
    use crate::transform::TransformResult;
    use crate::input::RawKeyEvent;
    use crate::KeyCode;

    fn passthrough() -> Box<dyn EventListener> {
        Box::new(|e: &RawKeyEvent| TransformResult::Unchanged(*e))
    }

    fn quick_options() -> TapOptions {
        TapOptions {
            config: TapConfig {
                create_retry_delay: Duration::from_millis(1),
                watchdog_interval: None,
                ..TapConfig::default()
            },
            ..TapOptions::default()
        }
    }

    #[test]
    fn test_create_activates() {
        let mut backend = SimulatedBackend::new();
        let tap = EventTap::create(&mut backend, passthrough(), quick_options()).unwrap();
        assert!(tap.is_active());
        assert_eq!(
            backend.deliver(RawKeyEvent::key_down(KeyCode::A)),
            Some(TapVerdict::PassThrough)
        );
    }

    #[test]
    fn test_resource_failure_retried_once() {
        let mut backend = SimulatedBackend::new();
        backend.fail_next_install(TapError::Resource("busy".into()));
        let tap = EventTap::create(&mut backend, passthrough(), quick_options()).unwrap();
        assert!(tap.is_active());
        assert_eq!(backend.install_attempts(), 2);
    }

    #[test]
    fn test_resource_failure_twice_gives_up() {
        let mut backend = SimulatedBackend::new();
        backend.fail_next_install(TapError::Resource("busy".into()));
        backend.fail_next_install(TapError::Resource("still busy".into()));
        let err = EventTap::create(&mut backend, passthrough(), quick_options()).err();
        assert_eq!(err, Some(TapError::Resource("still busy".into())));
        assert_eq!(backend.install_attempts(), 2);
    }

    #[test]
    fn test_permission_failure_not_retried() {
        let mut backend = SimulatedBackend::new();
        backend.fail_next_install(TapError::Permission);
        let err = EventTap::create(&mut backend, passthrough(), quick_options()).err();
        assert_eq!(err, Some(TapError::Permission));
        assert_eq!(backend.install_attempts(), 1);
    }

    #[test]
    fn test_destroy_idempotent() {
        let mut backend = SimulatedBackend::new();
        let tap = EventTap::create(&mut backend, passthrough(), quick_options()).unwrap();
        tap.destroy();
        tap.destroy();
        assert_eq!(tap.state(), TapState::Destroyed);
        assert!(!tap.reenable());
        assert!(backend.port().map_or(false, |p| p.is_removed()));
        assert_eq!(backend.deliver(RawKeyEvent::key_down(KeyCode::A)), None);
    }

    #[test]
    fn test_watchdog_recovers_silent_disable() {
        let mut backend = SimulatedBackend::new();
        let options = TapOptions {
            config: TapConfig {
                watchdog_interval: Some(Duration::from_millis(5)),
                ..TapConfig::default()
            },
            ..TapOptions::default()
        };
        let tap = EventTap::create(&mut backend, passthrough(), options).unwrap();
        let port = backend.port().unwrap();
        port.force_disable();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !port.is_enabled() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(port.is_enabled());
        assert!(tap.is_active());
    }
}
