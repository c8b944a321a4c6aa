// Maccel HID Key Mapping
// Driver-level remapping through the keyboard UserKeyMapping property

use std::process::Command;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{KeyCode, RemappingPair};

/// HID keyboard/keypad usage page, pre-shifted into the mapping layout
pub const KEYBOARD_USAGE_PAGE: u64 = 0x7_0000_0000;

#[derive(Debug, Error)]
pub enum HidError {
    #[error("Key {0} has no HID keyboard usage")]
    NoUsage(KeyCode),

    #[error("Failed to encode mapping: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to run hidutil: {0}")]
    Io(#[from] std::io::Error),

    #[error("hidutil exited with {status}: {stderr}")]
    Command { status: String, stderr: String },
}

/// One entry of the `UserKeyMapping` property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKeyMappingEntry {
    #[serde(rename = "HIDKeyboardModifierMappingSrc")]
    pub src: u64,
    #[serde(rename = "HIDKeyboardModifierMappingDst")]
    pub dst: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserKeyMapping {
    #[serde(rename = "UserKeyMapping")]
    entries: Vec<UserKeyMappingEntry>,
}

/// Usage ID on the keyboard page (HID Usage Tables, section 10)
fn usb_usage(name: &str) -> Option<u64> {
    if let [c] = name.as_bytes() {
        return match c {
            b'a'..=b'z' => Some(0x04 + u64::from(c - b'a')),
            b'1'..=b'9' => Some(0x1E + u64::from(c - b'1')),
            b'0' => Some(0x27),
            _ => None,
        };
    }
    if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u64>().ok()) {
        return match n {
            1..=12 => Some(0x3A + n - 1),
            13..=24 => Some(0x68 + n - 13),
            _ => None,
        };
    }
    let usage = match name {
        "enter" => 0x28,
        "esc" => 0x29,
        "backspace" => 0x2A,
        "tab" => 0x2B,
        "space" => 0x2C,
        "minus" => 0x2D,
        "equal" => 0x2E,
        "left_bracket" => 0x2F,
        "right_bracket" => 0x30,
        "backslash" => 0x31,
        "semicolon" => 0x33,
        "quote" => 0x34,
        "grave" => 0x35,
        "comma" => 0x36,
        "period" => 0x37,
        "slash" => 0x38,
        "capslock" => 0x39,
        "help" => 0x49,
        "home" => 0x4A,
        "page_up" => 0x4B,
        "forward_delete" => 0x4C,
        "end" => 0x4D,
        "page_down" => 0x4E,
        "right" => 0x4F,
        "left" => 0x50,
        "down" => 0x51,
        "up" => 0x52,
        "section" => 0x64,
        "lcontrol" => 0xE0,
        "lshift" => 0xE1,
        "loption" => 0xE2,
        "lcommand" => 0xE3,
        "rcontrol" => 0xE4,
        "rshift" => 0xE5,
        "roption" => 0xE6,
        "rcommand" => 0xE7,
        _ => return None,
    };
    Some(usage)
}

/// Full HID usage for a native key, if the key has one
pub fn hid_usage(key: KeyCode) -> Option<u64> {
    key.name()
        .and_then(usb_usage)
        .map(|usage| KEYBOARD_USAGE_PAGE | usage)
}

/// Translate remapping pairs into mapping entries
pub fn user_key_mapping(pairs: &[RemappingPair]) -> Result<Vec<UserKeyMappingEntry>, HidError> {
    pairs
        .iter()
        .map(|pair| {
            let src = hid_usage(pair.source).ok_or(HidError::NoUsage(pair.source))?;
            let dst = hid_usage(pair.destination).ok_or(HidError::NoUsage(pair.destination))?;
            Ok(UserKeyMappingEntry { src, dst })
        })
        .collect()
}

/// JSON accepted by `hidutil property --set`
pub fn property_json(entries: &[UserKeyMappingEntry]) -> Result<String, HidError> {
    Ok(serde_json::to_string(&UserKeyMapping {
        entries: entries.to_vec(),
    })?)
}

/// Install `pairs` as the keyboard driver's mapping, replacing any previous one
pub fn apply(pairs: &[RemappingPair]) -> Result<(), HidError> {
    let entries = user_key_mapping(pairs)?;
    set_property(&property_json(&entries)?)?;
    log::info!("Installed {} HID key mappings", entries.len());
    Ok(())
}

/// Remove every driver-level mapping
pub fn clear() -> Result<(), HidError> {
    set_property(&property_json(&[])?)?;
    log::info!("Cleared HID key mappings");
    Ok(())
}

fn set_property(json: &str) -> Result<(), HidError> {
    log::debug!("hidutil property --set {}", json);
    let output = Command::new("hidutil")
        .args(["property", "--set", json])
        .output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(HidError::Command {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}
