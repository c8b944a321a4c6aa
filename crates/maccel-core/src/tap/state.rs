// Maccel Event Tap - Lifecycle State
// Atomic tap state and the notices emitted on transitions

use std::sync::atomic::{AtomicU8, Ordering};

use strum_macros::{AsRefStr, Display};

use super::listener::DisableReason;

/// Lifecycle of an event tap.
///
/// `Disabled` is transient: the tap always tries to get back to `Active`.
/// `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[repr(u8)]
pub enum TapState {
    Inactive = 0,
    Active = 1,
    Disabled = 2,
    Destroyed = 3,
}

impl TapState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TapState::Inactive,
            1 => TapState::Active,
            2 => TapState::Disabled,
            _ => TapState::Destroyed,
        }
    }
}

/// Tap state readable and writable from any thread
#[derive(Debug)]
pub struct TapStatus(AtomicU8);

impl TapStatus {
    pub fn new() -> Self {
        Self(AtomicU8::new(TapState::Inactive as u8))
    }

    pub fn get(&self) -> TapState {
        TapState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move to `to` if the current state is one of `from`
    pub fn transition(&self, from: &[TapState], to: TapState) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                from.contains(&TapState::from_u8(current)).then_some(to as u8)
            })
            .is_ok()
    }

    /// Enter `Destroyed`; returns false if it already was
    pub fn destroy(&self) -> bool {
        self.0.swap(TapState::Destroyed as u8, Ordering::AcqRel) != TapState::Destroyed as u8
    }
}

impl Default for TapStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Health notifications for whoever owns the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineNotice {
    /// The OS stopped delivering events
    TapDisabled(DisableReason),
    /// Delivery restored after a disable
    TapReenabled,
    /// Re-enabling keeps failing; needs the user's attention
    ReenableExhausted { attempts: u32 },
}
