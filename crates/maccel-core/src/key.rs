// Maccel Key Type
// Represents a single key code in the macOS virtual key numbering

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::Modifiers;

include!(concat!(env!("OUT_DIR"), "/key_codes.rs"));

impl KeyCode {
    pub const A: KeyCode = KeyCode(0x00);
    pub const ESCAPE: KeyCode = KeyCode(0x35);
    pub const RIGHT_COMMAND: KeyCode = KeyCode(0x36);
    pub const LEFT_COMMAND: KeyCode = KeyCode(0x37);
    pub const LEFT_SHIFT: KeyCode = KeyCode(0x38);
    pub const CAPS_LOCK: KeyCode = KeyCode(0x39);
    pub const LEFT_OPTION: KeyCode = KeyCode(0x3A);
    pub const LEFT_CONTROL: KeyCode = KeyCode(0x3B);
    pub const RIGHT_SHIFT: KeyCode = KeyCode(0x3C);
    pub const RIGHT_OPTION: KeyCode = KeyCode(0x3D);
    pub const RIGHT_CONTROL: KeyCode = KeyCode(0x3E);
    pub const FUNCTION: KeyCode = KeyCode(0x3F);
    pub const F19: KeyCode = KeyCode(0x50);

    /// Create a key code from its raw value
    pub const fn new(code: u64) -> Self {
        KeyCode(code)
    }

    /// Get the raw numeric code value
    pub fn code(self) -> u64 {
        self.0
    }

    /// The value as a native 16-bit key code, if it fits in the event field.
    pub fn to_native(self) -> Option<u16> {
        u16::try_from(self.0).ok()
    }

    /// Canonical name, if the code is in the name table
    pub fn name(self) -> Option<&'static str> {
        self.to_native().and_then(key_name)
    }

    /// The modifier this key drives, or an empty set for ordinary keys.
    pub fn modifier(self) -> Modifiers {
        Modifiers::for_key(self)
    }

    /// Whether the key produces FlagsChanged transitions instead of KeyDown/KeyUp
    pub fn is_modifier(self) -> bool {
        !self.modifier().is_empty()
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "0x{:02x}", self.0),
        }
    }
}

impl FromStr for KeyCode {
    type Err = String;

    /// Accepts a key name (`capslock`), a hex code (`0x39`) or a decimal code (`57`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return u64::from_str_radix(hex, 16)
                .map(KeyCode)
                .map_err(|_| format!("Invalid hex key code: {}", s));
        }
        if let Some(key) = key_from_name(trimmed) {
            return Ok(key);
        }
        trimmed
            .parse::<u64>()
            .map(KeyCode)
            .map_err(|_| format!("Unknown key: {}", s))
    }
}

/// Display name for a native key code
pub fn key_name(code: u16) -> Option<&'static str> {
    static NAMES: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    NAMES
        .get_or_init(|| {
            KEY_TABLE
                .iter()
                .map(|(code, names)| (*code, names[0]))
                .collect()
        })
        .get(&code)
        .copied()
}

/// Look up a key by name or alias (case-insensitive)
pub fn key_from_name(name: &str) -> Option<KeyCode> {
    static BY_NAME: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    let lowered = name.to_ascii_lowercase();
    BY_NAME
        .get_or_init(|| {
            KEY_TABLE
                .iter()
                .flat_map(|(code, names)| names.iter().map(move |n| (*n, *code)))
                .collect()
        })
        .get(lowered.as_str())
        .map(|code| KeyCode::from(*code))
}

/// All named keys in code order, with their aliases
pub fn named_keys() -> impl Iterator<Item = (KeyCode, &'static [&'static str])> {
    KEY_TABLE
        .iter()
        .map(|(code, names)| (KeyCode::from(*code), *names))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_name_and_alias() {
        assert_eq!(key_from_name("capslock"), Some(KeyCode::CAPS_LOCK));
        assert_eq!(key_from_name("Caps"), Some(KeyCode::CAPS_LOCK));
        assert_eq!(key_from_name("rctrl"), Some(KeyCode::RIGHT_CONTROL));
        assert_eq!(key_from_name("no_such_key"), None);
    }

    #[test]
    fn test_key_parse_numeric_forms() {
        assert_eq!("0x39".parse::<KeyCode>(), Ok(KeyCode::CAPS_LOCK));
        assert_eq!("57".parse::<KeyCode>(), Ok(KeyCode::CAPS_LOCK));
        assert_eq!("f19".parse::<KeyCode>(), Ok(KeyCode::F19));
        assert!("0xzz".parse::<KeyCode>().is_err());
        assert!("bogus".parse::<KeyCode>().is_err());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(KeyCode::ESCAPE.to_string(), "esc");
        assert_eq!(KeyCode::new(0x34).to_string(), "0x34");
        assert_eq!(KeyCode::new(0x1_0000).to_string(), "0x10000");
    }

    #[test]
    fn test_out_of_range_code_has_no_native_value() {
        assert_eq!(KeyCode::new(0x7E).to_native(), Some(0x7E));
        assert_eq!(KeyCode::new(u64::from(u16::MAX) + 1).to_native(), None);
        assert_eq!(KeyCode::new(u64::MAX).name(), None);
    }

    #[test]
    fn test_modifier_keys() {
        assert!(KeyCode::LEFT_CONTROL.is_modifier());
        assert!(KeyCode::RIGHT_COMMAND.is_modifier());
        assert!(!KeyCode::A.is_modifier());
        assert!(!KeyCode::F19.is_modifier());
    }

    #[test]
    fn test_named_keys_have_unique_codes() {
        let mut codes: Vec<_> = named_keys().map(|(k, _)| k).collect();
        let total = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }
}
