// Maccel Event Tap - Listener
// Tagged tap input and the listener seam the tap calls into

use std::time::Duration;

use strum_macros::Display;

use crate::input::{event_type, key_action, RawKeyEvent};
use crate::output::{ActionQueue, DeferredAction};
use crate::shortpress::ShortPressDetector;
use crate::transform::{HeldRemaps, TransformResult};
use crate::modifier;
use crate::{Modifiers, SharedTable};

/// Why the OS stopped delivering events to the tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DisableReason {
    /// The callback took too long
    Timeout,
    /// Disabled by user input or another process
    UserInput,
}

/// What the OS hands the tap: a normal event or a disabled notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapInput {
    Normal(RawKeyEvent),
    Disabled(DisableReason),
}

impl TapInput {
    /// Tag a raw event by its native type
    pub fn from_event(event: RawKeyEvent) -> Self {
        match event.event_type {
            event_type::TAP_DISABLED_BY_TIMEOUT => TapInput::Disabled(DisableReason::Timeout),
            event_type::TAP_DISABLED_BY_USER_INPUT => TapInput::Disabled(DisableReason::UserInput),
            _ => TapInput::Normal(event),
        }
    }
}

/// Receives every normal event the tap intercepts.
///
/// Called synchronously on the tap's run-loop thread, one event at a time.
/// Implementations must return quickly: no blocking I/O, no contended locks.
pub trait EventListener: Send {
    fn on_event(&mut self, event: &RawKeyEvent) -> TransformResult;
}

impl<F> EventListener for F
where
    F: FnMut(&RawKeyEvent) -> TransformResult + Send,
{
    fn on_event(&mut self, event: &RawKeyEvent) -> TransformResult {
        self(event)
    }
}

/// Production listener: remaps through the published table
pub struct RemapListener {
    table: SharedTable,
    held: HeldRemaps,
    short_press: ShortPressDetector,
    actions: ActionQueue,
}

impl RemapListener {
    pub fn new(table: SharedTable, actions: ActionQueue, short_press_threshold: Duration) -> Self {
        Self {
            table,
            held: HeldRemaps::new(),
            short_press: ShortPressDetector::new(short_press_threshold),
            actions,
        }
    }
}

impl EventListener for RemapListener {
    fn on_event(&mut self, event: &RawKeyEvent) -> TransformResult {
        // one snapshot per event: a concurrent publish never splits an event
        let table = self.table.load();

        if let Some(key) = self.short_press.observe(event) {
            if let Some(index) = table.input_source_for(key) {
                self.actions.push(DeferredAction::SelectInputSource(index));
            }
        }

        let result = self.held.resolve(event, &table);
        if log::log_enabled!(log::Level::Debug) {
            log_event(event, &result);
        }
        result
    }
}

fn log_event(event: &RawKeyEvent, result: &TransformResult) {
    let Some(action) = key_action(event) else {
        return;
    };
    let mods = Modifiers::from_event_flags(modifier::with_key(event.flags, event.key_code, false));
    let outcome = match result {
        TransformResult::Unchanged(_) => "unchanged".to_string(),
        TransformResult::Mutated(e) => format!("-> {}", e.key_code),
        TransformResult::Suppressed => "suppressed".to_string(),
        TransformResult::Reinject(k) => format!("-> {} (synthetic)", k),
        TransformResult::Tap(k) => format!("-> {} tap (synthetic)", k),
    };
    log::debug!(
        "{}{}{} ({}) {}",
        mods,
        event.key_code,
        action.arrow(),
        event.key_code.code(),
        outcome
    );
}
