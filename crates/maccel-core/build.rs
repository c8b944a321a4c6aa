use std::env;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// macOS virtual key codes (Carbon `kVK_*`) and the names accepted for them.
/// The first name is the canonical display name.
const KEY_NAMES: &[(u16, &[&str])] = &[
    (0x00, &["a"]),
    (0x01, &["s"]),
    (0x02, &["d"]),
    (0x03, &["f"]),
    (0x04, &["h"]),
    (0x05, &["g"]),
    (0x06, &["z"]),
    (0x07, &["x"]),
    (0x08, &["c"]),
    (0x09, &["v"]),
    (0x0A, &["section", "iso_section"]),
    (0x0B, &["b"]),
    (0x0C, &["q"]),
    (0x0D, &["w"]),
    (0x0E, &["e"]),
    (0x0F, &["r"]),
    (0x10, &["y"]),
    (0x11, &["t"]),
    (0x12, &["1"]),
    (0x13, &["2"]),
    (0x14, &["3"]),
    (0x15, &["4"]),
    (0x16, &["6"]),
    (0x17, &["5"]),
    (0x18, &["equal"]),
    (0x19, &["9"]),
    (0x1A, &["7"]),
    (0x1B, &["minus"]),
    (0x1C, &["8"]),
    (0x1D, &["0"]),
    (0x1E, &["right_bracket", "rbracket"]),
    (0x1F, &["o"]),
    (0x20, &["u"]),
    (0x21, &["left_bracket", "lbracket"]),
    (0x22, &["i"]),
    (0x23, &["p"]),
    (0x24, &["enter", "return"]),
    (0x25, &["l"]),
    (0x26, &["j"]),
    (0x27, &["quote", "apostrophe"]),
    (0x28, &["k"]),
    (0x29, &["semicolon"]),
    (0x2A, &["backslash"]),
    (0x2B, &["comma"]),
    (0x2C, &["slash"]),
    (0x2D, &["n"]),
    (0x2E, &["m"]),
    (0x2F, &["period", "dot"]),
    (0x30, &["tab"]),
    (0x31, &["space"]),
    (0x32, &["grave", "backtick"]),
    (0x33, &["backspace", "delete"]),
    (0x35, &["esc", "escape"]),
    (0x36, &["rcommand", "rcmd"]),
    (0x37, &["lcommand", "lcmd", "command", "cmd"]),
    (0x38, &["lshift", "shift"]),
    (0x39, &["capslock", "caps"]),
    (0x3A, &["loption", "lalt", "option", "alt"]),
    (0x3B, &["lcontrol", "lctrl", "control", "ctrl"]),
    (0x3C, &["rshift"]),
    (0x3D, &["roption", "ralt"]),
    (0x3E, &["rcontrol", "rctrl"]),
    (0x3F, &["fn", "function"]),
    (0x40, &["f17"]),
    (0x41, &["kp_decimal"]),
    (0x43, &["kp_multiply"]),
    (0x45, &["kp_plus"]),
    (0x47, &["kp_clear"]),
    (0x48, &["volume_up"]),
    (0x49, &["volume_down"]),
    (0x4A, &["mute"]),
    (0x4B, &["kp_divide"]),
    (0x4C, &["kp_enter"]),
    (0x4E, &["kp_minus"]),
    (0x4F, &["f18"]),
    (0x50, &["f19"]),
    (0x51, &["kp_equal"]),
    (0x52, &["kp_0"]),
    (0x53, &["kp_1"]),
    (0x54, &["kp_2"]),
    (0x55, &["kp_3"]),
    (0x56, &["kp_4"]),
    (0x57, &["kp_5"]),
    (0x58, &["kp_6"]),
    (0x59, &["kp_7"]),
    (0x5A, &["f20"]),
    (0x5B, &["kp_8"]),
    (0x5C, &["kp_9"]),
    (0x60, &["f5"]),
    (0x61, &["f6"]),
    (0x62, &["f7"]),
    (0x63, &["f3"]),
    (0x64, &["f8"]),
    (0x65, &["f9"]),
    (0x67, &["f11"]),
    (0x69, &["f13"]),
    (0x6A, &["f16"]),
    (0x6B, &["f14"]),
    (0x6D, &["f10"]),
    (0x6F, &["f12"]),
    (0x71, &["f15"]),
    (0x72, &["help", "insert"]),
    (0x73, &["home"]),
    (0x74, &["page_up", "pgup"]),
    (0x75, &["forward_delete", "del"]),
    (0x76, &["f4"]),
    (0x77, &["end"]),
    (0x78, &["f2"]),
    (0x79, &["page_down", "pgdn"]),
    (0x7A, &["f1"]),
    (0x7B, &["left", "arrow_left"]),
    (0x7C, &["right", "arrow_right"]),
    (0x7D, &["down", "arrow_down"]),
    (0x7E, &["up", "arrow_up"]),
];

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("key_codes.rs");
    let mut f = File::create(&dest_path).unwrap();

    writeln!(
        f,
        r#"
/// A keyboard key code in the native macOS virtual key numbering.
///
/// The domain is a 64-bit integer so any value read from an event field can be
/// carried around; only values that fit the 16-bit key-code field can ever be
/// written back into an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct KeyCode(pub u64);

impl From<u64> for KeyCode {{
    fn from(code: u64) -> Self {{
        KeyCode(code)
    }}
}}

impl From<u16> for KeyCode {{
    fn from(code: u16) -> Self {{
        KeyCode(code as u64)
    }}
}}

impl From<KeyCode> for u64 {{
    fn from(key: KeyCode) -> Self {{
        key.0
    }}
}}
"#
    )
    .unwrap();

    writeln!(f, "/// Canonical names and aliases, indexed by virtual key code.").unwrap();
    writeln!(f, "static KEY_TABLE: &[(u16, &[&str])] = &[").unwrap();
    for (code, names) in KEY_NAMES {
        let quoted: Vec<String> = names.iter().map(|n| format!("{:?}", n)).collect();
        writeln!(f, "    (0x{:02X}, &[{}]),", code, quoted.join(", ")).unwrap();
    }
    writeln!(f, "];").unwrap();

    println!("cargo:rerun-if-changed=build.rs");
}
