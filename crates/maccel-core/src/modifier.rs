// Maccel Modifier Flags
// Modifier key state decoded from native event flags

use std::fmt;

use bitflags::bitflags;

use crate::KeyCode;

/// Native `CGEventFlags` bits the engine cares about.
///
/// The high word holds one bit per logical modifier, shared by the left and
/// right keys. The low word holds the `NX_DEVICE*KEYMASK` bits, one per
/// physical key.
pub mod event_flags {
    pub const ALPHA_SHIFT: u64 = 0x0001_0000;
    pub const SHIFT: u64 = 0x0002_0000;
    pub const CONTROL: u64 = 0x0004_0000;
    pub const ALTERNATE: u64 = 0x0008_0000;
    pub const COMMAND: u64 = 0x0010_0000;
    pub const SECONDARY_FN: u64 = 0x0080_0000;

    pub const DEVICE_LEFT_CONTROL: u64 = 0x0000_0001;
    pub const DEVICE_LEFT_SHIFT: u64 = 0x0000_0002;
    pub const DEVICE_RIGHT_SHIFT: u64 = 0x0000_0004;
    pub const DEVICE_LEFT_COMMAND: u64 = 0x0000_0008;
    pub const DEVICE_RIGHT_COMMAND: u64 = 0x0000_0010;
    pub const DEVICE_LEFT_ALTERNATE: u64 = 0x0000_0020;
    pub const DEVICE_RIGHT_ALTERNATE: u64 = 0x0000_0040;
    pub const DEVICE_RIGHT_CONTROL: u64 = 0x0000_2000;
}

/// (key, shared bit, device bit) for every sided modifier key
const DEVICE_TABLE: &[(KeyCode, u64, u64)] = &[
    (KeyCode::LEFT_CONTROL, event_flags::CONTROL, event_flags::DEVICE_LEFT_CONTROL),
    (KeyCode::RIGHT_CONTROL, event_flags::CONTROL, event_flags::DEVICE_RIGHT_CONTROL),
    (KeyCode::LEFT_SHIFT, event_flags::SHIFT, event_flags::DEVICE_LEFT_SHIFT),
    (KeyCode::RIGHT_SHIFT, event_flags::SHIFT, event_flags::DEVICE_RIGHT_SHIFT),
    (KeyCode::LEFT_OPTION, event_flags::ALTERNATE, event_flags::DEVICE_LEFT_ALTERNATE),
    (KeyCode::RIGHT_OPTION, event_flags::ALTERNATE, event_flags::DEVICE_RIGHT_ALTERNATE),
    (KeyCode::LEFT_COMMAND, event_flags::COMMAND, event_flags::DEVICE_LEFT_COMMAND),
    (KeyCode::RIGHT_COMMAND, event_flags::COMMAND, event_flags::DEVICE_RIGHT_COMMAND),
];

/// Device bit of a sided modifier key; 0 for caps lock, fn and ordinary keys
pub fn device_flag(key: KeyCode) -> u64 {
    DEVICE_TABLE
        .iter()
        .find(|(k, _, _)| *k == key)
        .map_or(0, |(_, _, device)| *device)
}

/// Device bits of every key sharing `shared`
fn sibling_device_flags(shared: u64) -> u64 {
    DEVICE_TABLE
        .iter()
        .filter(|(_, bit, _)| *bit == shared)
        .fold(0, |acc, (_, _, device)| acc | device)
}

/// All bits a modifier key sets while down: the shared bit and its own device bit
pub fn key_flags(key: KeyCode) -> u64 {
    Modifiers::for_key(key).to_event_flags() | device_flag(key)
}

/// Whether `key` is down according to a flags word.
///
/// Reads the key's own device bit, so releasing one side while the other is
/// held is still a release. Flags without any device bit for the modifier
/// (hand-built events) fall back to the shared bit.
pub fn is_key_down(flags: u64, key: KeyCode) -> bool {
    let shared = Modifiers::for_key(key).to_event_flags();
    if shared == 0 {
        return false;
    }
    let device = device_flag(key);
    if device != 0 && flags & sibling_device_flags(shared) != 0 {
        flags & device != 0
    } else {
        flags & shared != 0
    }
}

/// Flags word after `key` goes down or up, leaving the other side intact.
///
/// The shared bit is only cleared once no sibling device bit remains.
pub fn with_key(flags: u64, key: KeyCode, down: bool) -> u64 {
    if down {
        return flags | key_flags(key);
    }
    let shared = Modifiers::for_key(key).to_event_flags();
    let rest = flags & !device_flag(key);
    if rest & sibling_device_flags(shared) != 0 {
        rest
    } else {
        rest & !shared
    }
}

bitflags! {
    /// Set of logical modifiers held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const CONTROL = 0x01;
        const SHIFT = 0x02;
        const OPTION = 0x04;
        const COMMAND = 0x08;
        const CAPS_LOCK = 0x10;
        const FUNCTION = 0x20;
    }
}

/// (modifier, native flag bit, symbol, textual name), in display order
const MODIFIER_TABLE: &[(Modifiers, u64, &str, &str)] = &[
    (Modifiers::COMMAND, event_flags::COMMAND, "⌘", "command"),
    (Modifiers::CONTROL, event_flags::CONTROL, "⌃", "ctrl"),
    (Modifiers::OPTION, event_flags::ALTERNATE, "⌥", "option"),
    (Modifiers::SHIFT, event_flags::SHIFT, "⇧", "shift"),
    (Modifiers::CAPS_LOCK, event_flags::ALPHA_SHIFT, "⇪", "caps"),
    (Modifiers::FUNCTION, event_flags::SECONDARY_FN, "fn", "fn"),
];

impl Modifiers {
    /// Decode from the raw flags word of a native event
    pub fn from_event_flags(flags: u64) -> Self {
        MODIFIER_TABLE
            .iter()
            .filter(|(_, bit, _, _)| flags & bit != 0)
            .fold(Modifiers::empty(), |acc, (m, _, _, _)| acc | *m)
    }

    /// Encode back into native flag bits
    pub fn to_event_flags(self) -> u64 {
        MODIFIER_TABLE
            .iter()
            .filter(|(m, _, _, _)| self.contains(*m))
            .fold(0, |acc, (_, bit, _, _)| acc | bit)
    }

    /// The modifier driven by a physical key; empty for ordinary keys
    pub fn for_key(key: KeyCode) -> Self {
        match key {
            KeyCode::LEFT_CONTROL | KeyCode::RIGHT_CONTROL => Modifiers::CONTROL,
            KeyCode::LEFT_SHIFT | KeyCode::RIGHT_SHIFT => Modifiers::SHIFT,
            KeyCode::LEFT_OPTION | KeyCode::RIGHT_OPTION => Modifiers::OPTION,
            KeyCode::LEFT_COMMAND | KeyCode::RIGHT_COMMAND => Modifiers::COMMAND,
            KeyCode::CAPS_LOCK => Modifiers::CAPS_LOCK,
            KeyCode::FUNCTION => Modifiers::FUNCTION,
            _ => Modifiers::empty(),
        }
    }

    /// Compact rendering such as `⌘⇧`
    pub fn symbolic(self) -> String {
        MODIFIER_TABLE
            .iter()
            .filter(|(m, _, _, _)| self.contains(*m))
            .map(|(_, _, sym, _)| *sym)
            .collect()
    }

    /// Readable rendering such as `command-shift`
    pub fn textual(self) -> String {
        MODIFIER_TABLE
            .iter()
            .filter(|(m, _, _, _)| self.contains(*m))
            .map(|(_, _, _, name)| *name)
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbolic())
    }
}
