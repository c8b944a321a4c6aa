// Maccel Input Layer - Raw Events
// Platform-neutral snapshot of a native keyboard event

use crate::KeyCode;

/// Native event type numbers (Quartz `CGEventType`)
pub mod event_type {
    pub const NULL: u32 = 0;
    pub const LEFT_MOUSE_DOWN: u32 = 1;
    pub const MOUSE_MOVED: u32 = 5;
    pub const KEY_DOWN: u32 = 10;
    pub const KEY_UP: u32 = 11;
    pub const FLAGS_CHANGED: u32 = 12;
    pub const SCROLL_WHEEL: u32 = 22;
    pub const SYSTEM_DEFINED: u32 = 14;
    pub const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
    pub const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;
}

/// Value written into the event source user-data field of every event the
/// engine synthesizes ("MACC").
pub const SYNTHETIC_EVENT_MARKER: i64 = 0x4D41_4343;

/// Copy of the fields of one native event that the engine reads or writes.
///
/// Being `Copy`, a transformed event is always a new value; the event the OS
/// handed to the callback is never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Native event type number
    pub event_type: u32,
    /// Key code field (zero for non-keyboard events)
    pub key_code: KeyCode,
    /// Native flags word
    pub flags: u64,
    /// Autorepeat marker for KeyDown events
    pub autorepeat: bool,
    /// Event timestamp in nanoseconds
    pub timestamp: u64,
    /// Event source user-data field
    pub user_data: i64,
}

impl RawKeyEvent {
    fn with_type(event_type: u32, key: KeyCode) -> Self {
        Self {
            event_type,
            key_code: key,
            flags: 0,
            autorepeat: false,
            timestamp: 0,
            user_data: 0,
        }
    }

    pub fn key_down(key: impl Into<KeyCode>) -> Self {
        Self::with_type(event_type::KEY_DOWN, key.into())
    }

    pub fn key_up(key: impl Into<KeyCode>) -> Self {
        Self::with_type(event_type::KEY_UP, key.into())
    }

    /// A modifier transition; `flags` holds the modifier state after it
    pub fn flags_changed(key: impl Into<KeyCode>, flags: u64) -> Self {
        Self::with_type(event_type::FLAGS_CHANGED, key.into()).with_flags(flags)
    }

    /// Any non-keyboard event, such as a mouse click
    pub fn other(event_type: u32) -> Self {
        Self::with_type(event_type, KeyCode::new(0))
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_autorepeat(mut self, autorepeat: bool) -> Self {
        self.autorepeat = autorepeat;
        self
    }

    pub fn with_user_data(mut self, user_data: i64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Copy of this event carrying a different key code
    pub fn with_key_code(mut self, key: KeyCode) -> Self {
        self.key_code = key;
        self
    }

    /// Check if this is one of the tap-disabled notifications
    pub fn is_tap_disabled(&self) -> bool {
        matches!(
            self.event_type,
            event_type::TAP_DISABLED_BY_TIMEOUT | event_type::TAP_DISABLED_BY_USER_INPUT
        )
    }
}

/// Decode a UTF-16 buffer reported for a key event into printable text.
///
/// Lone surrogates become U+FFFD and control characters are dropped, so the
/// result is always safe to put in a log line.
pub fn decode_key_text(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .filter(|c| !c.is_control())
        .collect()
}
