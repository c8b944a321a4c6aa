// Maccel Output Layer - Key Synthesis
// Synthetic key event requests and the synthesizer seam

use std::fmt;

use crate::{Action, KeyCode};

/// A single synthetic key transition to post into the input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntheticKey {
    pub key: KeyCode,
    pub down: bool,
}

impl SyntheticKey {
    pub fn down(key: KeyCode) -> Self {
        Self { key, down: true }
    }

    pub fn up(key: KeyCode) -> Self {
        Self { key, down: false }
    }

    /// Transition matching the phase of an observed event
    pub fn for_action(key: KeyCode, action: Action) -> Self {
        Self {
            key,
            down: action.is_down(),
        }
    }
}

impl fmt::Display for SyntheticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.key, if self.down { "↓" } else { "↑" })
    }
}

/// Failure to hand a synthetic event to the OS. Never escalated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectionFailure {
    #[error("Key code {0} does not fit the native key code field")]
    KeyOutOfRange(KeyCode),

    #[error("Failed to create event source")]
    EventSource,

    #[error("Failed to create keyboard event for {0}")]
    EventCreation(KeyCode),
}

/// Posts synthetic key events into the global input stream.
///
/// Implementations must tag every event they post with
/// [`SYNTHETIC_EVENT_MARKER`](crate::input::SYNTHETIC_EVENT_MARKER) so the
/// engine's own tap lets it through untouched.
pub trait KeySynthesizer: Send {
    /// Post one key transition
    fn post(&self, key: SyntheticKey) -> Result<(), InjectionFailure>;

    /// Post a full key-down / key-up pair. Best effort: failures are logged
    /// and dropped, since the OS gives no delivery guarantee either.
    fn send(&self, key: KeyCode) {
        for synthetic in [SyntheticKey::down(key), SyntheticKey::up(key)] {
            if let Err(e) = self.post(synthetic) {
                log::debug!("Dropping synthetic {}: {}", synthetic, e);
                return;
            }
        }
    }
}
