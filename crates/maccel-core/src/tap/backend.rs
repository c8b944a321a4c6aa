// Maccel Event Tap - Backend Seam
// What an OS event tap facility must provide

use std::sync::Arc;

use bitflags::bitflags;
use thiserror::Error;

use super::driver::TapDriver;
use crate::input::event_type;

bitflags! {
    /// Event types a tap subscribes to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u8 {
        const KEY_DOWN = 1 << 0;
        const KEY_UP = 1 << 1;
        const FLAGS_CHANGED = 1 << 2;
        const KEYBOARD = Self::KEY_DOWN.bits() | Self::KEY_UP.bits() | Self::FLAGS_CHANGED.bits();
    }
}

impl EventMask {
    /// Native event type numbers covered by this mask
    pub fn event_types(self) -> impl Iterator<Item = u32> {
        [
            (EventMask::KEY_DOWN, event_type::KEY_DOWN),
            (EventMask::KEY_UP, event_type::KEY_UP),
            (EventMask::FLAGS_CHANGED, event_type::FLAGS_CHANGED),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, ty)| ty)
    }

    /// Bit mask in the OS layout (`1 << type` per event type)
    pub fn to_native(self) -> u64 {
        self.event_types().fold(0, |mask, ty| mask | (1u64 << ty))
    }
}

impl Default for EventMask {
    fn default() -> Self {
        EventMask::KEYBOARD
    }
}

/// Why a tap could not be installed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapError {
    #[error(
        "input monitoring permission missing: allow this program under \
         System Settings > Privacy & Security > Accessibility, then restart it"
    )]
    Permission,

    #[error("event tap could not be created: {0}")]
    Resource(String),
}

impl TapError {
    /// Resource failures may be transient; permission failures never are
    pub fn is_retryable(&self) -> bool {
        matches!(self, TapError::Resource(_))
    }
}

/// A failed install hands the driver back so it can be retried
pub struct InstallError {
    pub error: TapError,
    /// `None` when the backend lost the driver; no retry is possible then
    pub driver: Option<TapDriver>,
}

impl InstallError {
    pub fn new(error: TapError, driver: TapDriver) -> Self {
        Self {
            error,
            driver: Some(driver),
        }
    }

    pub fn lost(error: TapError) -> Self {
        Self {
            error,
            driver: None,
        }
    }
}

impl std::fmt::Debug for InstallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallError").field("error", &self.error).finish()
    }
}

/// Handle to an installed OS tap
pub trait TapPort: Send + Sync {
    /// Re-arm delivery; true if the OS reports the tap enabled afterwards
    fn enable(&self) -> bool;

    /// Whether the OS currently delivers events to the tap
    fn is_enabled(&self) -> bool;

    /// Stop delivery and release the tap; no callback starts afterwards
    fn remove(&self);
}

/// An OS facility able to install taps.
///
/// The backend owns delivery: every intercepted event goes through
/// [`TapDriver::dispatch`] and its verdict decides what the OS forwards.
pub trait TapBackend {
    fn install(&mut self, mask: EventMask, driver: TapDriver) -> Result<Arc<dyn TapPort>, InstallError>;
}
