// Maccel Short Press Detection
// Recognises a key tapped on its own, used for input source switching

use std::time::Duration;

use crate::input::{extract_key_code, is_synthetic, key_action, RawKeyEvent};
use crate::modifier;
use crate::{Action, KeyCode, Modifiers};

/// Default press-to-release window for a short press
pub const DEFAULT_SHORT_PRESS_THRESHOLD: Duration = Duration::from_millis(175);

/// Detects a press followed by the release of the same key within the
/// threshold, with no other key event in between and no other modifier held.
#[derive(Debug, Clone)]
pub struct ShortPressDetector {
    threshold_ns: u64,
    pending: Option<(KeyCode, u64)>,
}

impl ShortPressDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold_ns: u64::try_from(threshold.as_nanos()).unwrap_or(u64::MAX),
            pending: None,
        }
    }

    /// Feed one event; returns the key when this event completes a short press
    pub fn observe(&mut self, event: &RawKeyEvent) -> Option<KeyCode> {
        if is_synthetic(event) {
            return None;
        }
        let (Some(key), Some(action)) = (extract_key_code(event), key_action(event)) else {
            return None;
        };

        match action {
            Action::Press => {
                let others = Modifiers::from_event_flags(modifier::with_key(event.flags, key, false));
                self.pending = others.is_empty().then_some((key, event.timestamp));
                None
            }
            Action::Repeat => {
                self.pending = None;
                None
            }
            Action::Release => match self.pending.take() {
                Some((pressed, at))
                    if pressed == key
                        && event.timestamp >= at
                        && event.timestamp - at < self.threshold_ns =>
                {
                    Some(key)
                }
                _ => None,
            },
        }
    }

    /// Forget a press in progress
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

impl Default for ShortPressDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SHORT_PRESS_THRESHOLD)
    }
}
