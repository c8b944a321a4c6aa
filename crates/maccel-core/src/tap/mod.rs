// Maccel Event Tap
// OS-independent tap lifecycle: install, heal, publish, destroy

mod backend;
mod driver;
mod event_tap;
mod listener;
mod state;
mod watchdog;

pub use backend::{EventMask, InstallError, TapBackend, TapError, TapPort};
pub use driver::{TapDriver, TapShared, TapVerdict};
pub use event_tap::{EventTap, TapConfig, TapOptions};
pub use listener::{DisableReason, EventListener, RemapListener, TapInput};
pub use state::{EngineNotice, TapState, TapStatus};
