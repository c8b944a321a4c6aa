// Maccel Input Layer - Event Classification
// Event category, key code and key phase extraction

use strum_macros::{AsRefStr, Display};

use super::event::{event_type, RawKeyEvent, SYNTHETIC_EVENT_MARKER};
use crate::modifier;
use crate::{Action, KeyCode};

/// Coarse category of an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum EventCategory {
    KeyDown,
    KeyUp,
    /// Modifier-only transition
    FlagsChanged,
    /// Mouse, scroll, system-defined: never remapped
    Other,
}

impl EventCategory {
    /// Categories that carry a key code and can be remapped
    pub fn is_remap_eligible(self) -> bool {
        !matches!(self, EventCategory::Other)
    }
}

/// Classify a raw event by its native type number
pub fn classify(event: &RawKeyEvent) -> EventCategory {
    match event.event_type {
        event_type::KEY_DOWN => EventCategory::KeyDown,
        event_type::KEY_UP => EventCategory::KeyUp,
        event_type::FLAGS_CHANGED => EventCategory::FlagsChanged,
        _ => EventCategory::Other,
    }
}

/// Key code of a keyboard event; `None` for every other category
pub fn extract_key_code(event: &RawKeyEvent) -> Option<KeyCode> {
    classify(event)
        .is_remap_eligible()
        .then_some(event.key_code)
}

/// Phase of a keyboard event.
///
/// FlagsChanged events carry no explicit up/down marker: the key is down when
/// its own device bit is set in the event flags, so a release of one side is
/// seen while the other side is held. Keys without a known modifier bit
/// resolve to `Release`.
pub fn key_action(event: &RawKeyEvent) -> Option<Action> {
    match classify(event) {
        EventCategory::KeyDown => Some(Action::from_key_event(true, event.autorepeat)),
        EventCategory::KeyUp => Some(Action::from_key_event(false, false)),
        EventCategory::FlagsChanged => Some(Action::from_key_event(
            modifier::is_key_down(event.flags, event.key_code),
            false,
        )),
        EventCategory::Other => None,
    }
}

/// Check if the event was posted by this engine's synthesizer
pub fn is_synthetic(event: &RawKeyEvent) -> bool {
    event.user_data == SYNTHETIC_EVENT_MARKER
}
