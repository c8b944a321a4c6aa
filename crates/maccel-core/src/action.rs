// Maccel Key Phase
// Press, repeat or release, as decoded from a native keyboard event

use std::fmt;

/// Phase of a key event.
///
/// KeyDown events become `Press`, or `Repeat` when the OS marks them as
/// autorepeat. KeyUp events become `Release`. FlagsChanged events are
/// resolved from the modifier bits they carry and never repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Release,
    Press,
    Repeat,
}

impl Action {
    /// Phase of a KeyDown/KeyUp event
    pub fn from_key_event(down: bool, autorepeat: bool) -> Self {
        match (down, autorepeat) {
            (false, _) => Action::Release,
            (true, false) => Action::Press,
            (true, true) => Action::Repeat,
        }
    }

    /// Key is held after this event
    pub fn is_down(self) -> bool {
        self != Action::Release
    }

    /// OS generated autorepeat
    pub fn is_autorepeat(self) -> bool {
        self == Action::Repeat
    }

    /// Arrow glyph used in event logs
    pub fn arrow(self) -> &'static str {
        match self {
            Action::Press => "↓",
            Action::Repeat => "↓↓",
            Action::Release => "↑",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Release => "release",
            Action::Press => "press",
            Action::Repeat => "repeat",
        })
    }
}
