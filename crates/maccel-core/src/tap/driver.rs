// Maccel Event Tap - Driver
// Per-event entry point called by a backend on the tap thread

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_channel::Sender;

use super::backend::TapPort;
use super::listener::{DisableReason, EventListener, TapInput};
use super::state::{EngineNotice, TapState, TapStatus};
use crate::input::RawKeyEvent;
use crate::output::{ActionQueue, DeferredAction};
use crate::transform::TransformResult;

/// What the OS should do with an intercepted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapVerdict {
    PassThrough,
    Replace(RawKeyEvent),
    Suppress,
}

/// State shared between the tap thread, the watchdog and the owner
pub struct TapShared {
    status: TapStatus,
    port: OnceLock<Arc<dyn TapPort>>,
    reenable_failures: AtomicU32,
    reenable_limit: u32,
    exhausted_reported: AtomicBool,
    notices: Option<Sender<EngineNotice>>,
}

impl TapShared {
    pub fn new(reenable_limit: u32, notices: Option<Sender<EngineNotice>>) -> Self {
        Self {
            status: TapStatus::new(),
            port: OnceLock::new(),
            reenable_failures: AtomicU32::new(0),
            reenable_limit: reenable_limit.max(1),
            exhausted_reported: AtomicBool::new(false),
            notices,
        }
    }

    pub fn state(&self) -> TapState {
        self.status.get()
    }

    pub(crate) fn status(&self) -> &TapStatus {
        &self.status
    }

    pub(crate) fn attach(&self, port: Arc<dyn TapPort>) {
        if self.port.set(port).is_err() {
            log::warn!("Event tap port attached twice");
        }
    }

    /// Consecutive refused re-enable attempts
    pub fn reenable_failures(&self) -> u32 {
        self.reenable_failures.load(Ordering::Acquire)
    }

    /// Record that the OS stopped delivering; false if already disabled or destroyed
    pub fn mark_disabled(&self, reason: DisableReason) -> bool {
        if !self
            .status
            .transition(&[TapState::Inactive, TapState::Active], TapState::Disabled)
        {
            return false;
        }
        log::warn!("Event tap disabled ({})", reason);
        self.notify(EngineNotice::TapDisabled(reason));
        true
    }

    /// Ask the OS to resume delivery. Safe to call in any state and from any thread.
    pub fn reenable(&self) -> bool {
        match self.state() {
            TapState::Destroyed => return false,
            TapState::Active => return true,
            _ => {}
        }
        let Some(port) = self.port.get() else {
            return false;
        };

        if port.enable() {
            self.reenable_failures.store(0, Ordering::Release);
            self.exhausted_reported.store(false, Ordering::Release);
            if self.status.transition(&[TapState::Disabled], TapState::Active) {
                log::info!("Event tap re-enabled");
                self.notify(EngineNotice::TapReenabled);
            }
            return self.state() == TapState::Active;
        }

        let failures = self.reenable_failures.fetch_add(1, Ordering::AcqRel) + 1;
        log::warn!("Event tap re-enable refused ({} in a row)", failures);
        if failures >= self.reenable_limit && !self.exhausted_reported.swap(true, Ordering::AcqRel) {
            log::error!(
                "Event tap stays disabled after {} attempts; check accessibility permission",
                failures
            );
            self.notify(EngineNotice::ReenableExhausted { attempts: failures });
        }
        false
    }

    /// Reconcile the recorded state with what the OS reports
    pub fn check_liveness(&self) {
        match self.state() {
            TapState::Active => {
                let silently_disabled = self.port.get().is_some_and(|port| !port.is_enabled());
                if silently_disabled && self.mark_disabled(DisableReason::UserInput) {
                    self.reenable();
                }
            }
            TapState::Disabled => {
                self.reenable();
            }
            TapState::Inactive | TapState::Destroyed => {}
        }
    }

    fn notify(&self, notice: EngineNotice) {
        if let Some(tx) = &self.notices {
            let _ = tx.try_send(notice);
        }
    }
}

/// Runs the listener for each intercepted event and turns its result
/// into a verdict the backend applies.
pub struct TapDriver {
    listener: Box<dyn EventListener>,
    shared: Arc<TapShared>,
    actions: ActionQueue,
}

impl TapDriver {
    pub fn new(
        listener: Box<dyn EventListener>,
        shared: Arc<TapShared>,
        actions: ActionQueue,
    ) -> Self {
        Self {
            listener,
            shared,
            actions,
        }
    }

    pub fn shared(&self) -> &Arc<TapShared> {
        &self.shared
    }

    /// Handle one delivery from the OS. Never panics.
    pub fn dispatch(&mut self, input: TapInput) -> TapVerdict {
        match input {
            TapInput::Disabled(reason) => {
                self.shared.mark_disabled(reason);
                self.shared.reenable();
                TapVerdict::PassThrough
            }
            TapInput::Normal(event) => {
                if self.shared.state() == TapState::Destroyed {
                    return TapVerdict::PassThrough;
                }
                let listener = &mut self.listener;
                match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                    Ok(result) => self.verdict(result),
                    Err(_) => {
                        log::error!("Event listener panicked; passing event through");
                        TapVerdict::PassThrough
                    }
                }
            }
        }
    }

    fn verdict(&self, result: TransformResult) -> TapVerdict {
        match result {
            TransformResult::Unchanged(_) => TapVerdict::PassThrough,
            TransformResult::Mutated(event) => TapVerdict::Replace(event),
            TransformResult::Suppressed => TapVerdict::Suppress,
            TransformResult::Reinject(key) => self.defer(DeferredAction::Post(key)),
            TransformResult::Tap(key) => self.defer(DeferredAction::Send(key)),
        }
    }

    /// Suppress the original once its replacement is queued
    fn defer(&self, action: DeferredAction) -> TapVerdict {
        if self.actions.push(action) {
            TapVerdict::Suppress
        } else {
            TapVerdict::PassThrough
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SyntheticKey;
    use crate::KeyCode;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakePort {
        enabled: Mutex<bool>,
        refusals: AtomicU32,
    }

    impl TapPort for FakePort {
        fn enable(&self) -> bool {
            if self.refusals.load(Ordering::Acquire) > 0 {
                self.refusals.fetch_sub(1, Ordering::AcqRel);
                return false;
            }
            *self.enabled.lock() = true;
            true
        }

        fn is_enabled(&self) -> bool {
            *self.enabled.lock()
        }

        fn remove(&self) {
            *self.enabled.lock() = false;
        }
    }

    fn active_shared(port: Arc<FakePort>, limit: u32) -> (Arc<TapShared>, crossbeam_channel::Receiver<EngineNotice>) {
        let (tx, rx) = unbounded();
        let shared = Arc::new(TapShared::new(limit, Some(tx)));
        shared.attach(port);
        shared.status().transition(&[TapState::Inactive], TapState::Active);
        (shared, rx)
    }

    fn driver(listener: impl EventListener + 'static, shared: Arc<TapShared>) -> TapDriver {
        TapDriver::new(Box::new(listener), shared, ActionQueue::detached())
    }

    #[test]
    fn test_normal_event_verdicts() {
        let (shared, _rx) = active_shared(Arc::new(FakePort::default()), 3);
        let mut pass = driver(|e: &RawKeyEvent| TransformResult::Unchanged(*e), shared.clone());
        let event = RawKeyEvent::key_down(KeyCode::A);
        assert_eq!(pass.dispatch(TapInput::Normal(event)), TapVerdict::PassThrough);

        let mut drop_all = driver(|_: &RawKeyEvent| TransformResult::Suppressed, shared);
        assert_eq!(drop_all.dispatch(TapInput::Normal(event)), TapVerdict::Suppress);
    }

    #[test]
    fn test_panicking_listener_passes_through() {
        let (shared, _rx) = active_shared(Arc::new(FakePort::default()), 3);
        let mut d = driver(|_: &RawKeyEvent| -> TransformResult { panic!("boom") }, shared.clone());
        let event = RawKeyEvent::key_down(KeyCode::A);
        assert_eq!(d.dispatch(TapInput::Normal(event)), TapVerdict::PassThrough);
        assert_eq!(shared.state(), TapState::Active);
    }

    #[test]
    fn test_reinject_without_worker_passes_through() {
        let (shared, _rx) = active_shared(Arc::new(FakePort::default()), 3);
        let mut d = driver(
            |_: &RawKeyEvent| TransformResult::Reinject(SyntheticKey::down(KeyCode::ESCAPE)),
            shared,
        );
        let event = RawKeyEvent::key_down(KeyCode::CAPS_LOCK);
        assert_eq!(d.dispatch(TapInput::Normal(event)), TapVerdict::PassThrough);
    }

    #[test]
    fn test_disabled_notification_reenables() {
        let port = Arc::new(FakePort::default());
        let (shared, rx) = active_shared(port.clone(), 3);
        let mut d = driver(|e: &RawKeyEvent| TransformResult::Unchanged(*e), shared.clone());

        assert_eq!(
            d.dispatch(TapInput::Disabled(DisableReason::Timeout)),
            TapVerdict::PassThrough
        );
        assert_eq!(shared.state(), TapState::Active);
        assert!(port.is_enabled());
        assert_eq!(rx.try_recv(), Ok(EngineNotice::TapDisabled(DisableReason::Timeout)));
        assert_eq!(rx.try_recv(), Ok(EngineNotice::TapReenabled));
    }

    #[test]
    fn test_exhaustion_reported_once() {
        let port = Arc::new(FakePort::default());
        port.refusals.store(10, Ordering::Release);
        let (shared, rx) = active_shared(port, 2);

        shared.mark_disabled(DisableReason::UserInput);
        for _ in 0..5 {
            assert!(!shared.reenable());
        }
        assert_eq!(shared.state(), TapState::Disabled);
        assert_eq!(shared.reenable_failures(), 5);

        let notices: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            notices,
            vec![
                EngineNotice::TapDisabled(DisableReason::UserInput),
                EngineNotice::ReenableExhausted { attempts: 2 },
            ]
        );
    }

    #[test]
    fn test_destroyed_never_reenables() {
        let port = Arc::new(FakePort::default());
        let (shared, _rx) = active_shared(port.clone(), 3);
        shared.status().destroy();
        assert!(!shared.reenable());
        assert!(!shared.mark_disabled(DisableReason::Timeout));
        assert!(!port.is_enabled());
    }

    #[test]
    fn test_liveness_detects_silent_disable() {
        let port = Arc::new(FakePort::default());
        let (shared, rx) = active_shared(port.clone(), 3);
        port.remove();
        shared.check_liveness();
        assert_eq!(shared.state(), TapState::Active);
        assert!(port.is_enabled());
        assert_eq!(rx.try_iter().count(), 2);
    }
}
