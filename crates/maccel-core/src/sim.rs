// Maccel Simulation
// In-process stand-ins for the OS tap, synthesizer and input sources

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::input::RawKeyEvent;
use crate::input_source::{check_index, InputSourceError};
use crate::output::{InjectionFailure, KeySynthesizer, SyntheticKey};
use crate::tap::{
    DisableReason, EventMask, InstallError, TapBackend, TapDriver, TapError, TapInput, TapPort,
    TapVerdict,
};
use crate::InputSourceSelector;

/// Port of a simulated tap
#[derive(Debug, Default)]
pub struct SimulatedPort {
    enabled: AtomicBool,
    removed: AtomicBool,
    refusals: AtomicU32,
    enable_calls: AtomicU32,
}

impl SimulatedPort {
    fn enabled() -> Self {
        let port = Self::default();
        port.enabled.store(true, Ordering::Release);
        port
    }

    /// Refuse the next `count` enable requests
    pub fn refuse_next(&self, count: u32) {
        self.refusals.store(count, Ordering::Release);
    }

    /// Stop delivery without telling the tap, like an OS that drops the notification
    pub fn force_disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn enable_calls(&self) -> u32 {
        self.enable_calls.load(Ordering::Acquire)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

impl TapPort for SimulatedPort {
    fn enable(&self) -> bool {
        self.enable_calls.fetch_add(1, Ordering::AcqRel);
        if self.is_removed() {
            return false;
        }
        let refused = self
            .refusals
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if !refused {
            self.enabled.store(true, Ordering::Release);
        }
        self.is_enabled()
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn remove(&self) {
        self.enabled.store(false, Ordering::Release);
        self.removed.store(true, Ordering::Release);
    }
}

#[derive(Default)]
struct BackendState {
    driver: Mutex<Option<TapDriver>>,
    port: Mutex<Option<Arc<SimulatedPort>>>,
    failures: Mutex<VecDeque<TapError>>,
    install_attempts: AtomicU32,
}

/// Backend that delivers events on the caller's thread.
///
/// Clones share the installed tap.
#[derive(Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<BackendState>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next install fail with `error`; failures queue up in order
    pub fn fail_next_install(&self, error: TapError) {
        self.state.failures.lock().push_back(error);
    }

    pub fn install_attempts(&self) -> u32 {
        self.state.install_attempts.load(Ordering::Acquire)
    }

    pub fn port(&self) -> Option<Arc<SimulatedPort>> {
        self.state.port.lock().clone()
    }

    /// Deliver one event the way the OS would.
    ///
    /// `None` when no enabled tap is installed and the event was not intercepted.
    pub fn deliver(&self, event: RawKeyEvent) -> Option<TapVerdict> {
        let port = self.port()?;
        if !port.is_enabled() {
            return None;
        }
        let mut driver = self.state.driver.lock();
        driver
            .as_mut()
            .map(|d| d.dispatch(TapInput::from_event(event)))
    }

    /// What the focused application receives for `event`
    pub fn forward(&self, event: RawKeyEvent) -> Option<RawKeyEvent> {
        match self.deliver(event) {
            None | Some(TapVerdict::PassThrough) => Some(event),
            Some(TapVerdict::Replace(replacement)) => Some(replacement),
            Some(TapVerdict::Suppress) => None,
        }
    }

    /// Disable the tap and send the OS notification for it
    pub fn disable(&self, reason: DisableReason) -> Option<TapVerdict> {
        let port = self.port()?;
        if port.is_removed() {
            return None;
        }
        port.force_disable();
        let mut driver = self.state.driver.lock();
        driver
            .as_mut()
            .map(|d| d.dispatch(TapInput::Disabled(reason)))
    }
}

impl TapBackend for SimulatedBackend {
    fn install(&mut self, mask: EventMask, driver: TapDriver) -> Result<Arc<dyn TapPort>, InstallError> {
        self.state.install_attempts.fetch_add(1, Ordering::AcqRel);
        if let Some(error) = self.state.failures.lock().pop_front() {
            return Err(InstallError::new(error, driver));
        }
        log::debug!("Simulated tap installed for {:?}", mask);
        let port = Arc::new(SimulatedPort::enabled());
        *self.state.driver.lock() = Some(driver);
        *self.state.port.lock() = Some(port.clone());
        Ok(port)
    }
}

/// Synthesizer that records posts instead of performing them.
///
/// Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynthesizer {
    posted: Arc<Mutex<Vec<SyntheticKey>>>,
}

impl RecordingSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<SyntheticKey> {
        self.posted.lock().clone()
    }
}

impl KeySynthesizer for RecordingSynthesizer {
    fn post(&self, key: SyntheticKey) -> Result<(), InjectionFailure> {
        if key.key.to_native().is_none() {
            return Err(InjectionFailure::KeyOutOfRange(key.key));
        }
        self.posted.lock().push(key);
        Ok(())
    }
}

#[derive(Debug)]
struct SourcesState {
    count: usize,
    current: Option<usize>,
    refuse: Option<i32>,
}

/// A fixed list of input sources, the first one selected.
///
/// Clones share the selection.
#[derive(Debug, Clone)]
pub struct StaticInputSources {
    state: Arc<Mutex<SourcesState>>,
}

impl StaticInputSources {
    pub fn new(count: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SourcesState {
                count,
                current: (count > 0).then_some(0),
                refuse: None,
            })),
        }
    }

    /// Make the next selection fail with the given OS status
    pub fn refuse_next(&self, status: i32) {
        self.state.lock().refuse = Some(status);
    }
}

impl InputSourceSelector for StaticInputSources {
    fn count(&self) -> usize {
        self.state.lock().count
    }

    fn current(&self) -> Option<usize> {
        self.state.lock().current
    }

    fn try_select(&self, index: usize) -> Result<(), InputSourceError> {
        let mut state = self.state.lock();
        check_index(index, state.count)?;
        if let Some(status) = state.refuse.take() {
            return Err(InputSourceError::Refused(status));
        }
        state.current = Some(index);
        Ok(())
    }
}
