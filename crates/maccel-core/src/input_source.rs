// Maccel Input Source Selection
// Switching the active keyboard layout by stable index

/// Reasons a layout switch did not happen
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputSourceError {
    #[error("Input source index {index} out of range ({available} available)")]
    InvalidIndex { index: usize, available: usize },

    #[error("Input source switch refused by the system (status {0})")]
    Refused(i32),
}

/// Selects one of the installed keyboard input sources.
///
/// Indexes refer to the enabled, selectable keyboard layouts in the order the
/// system enumerates them. Switching is a global, OS-visible side effect.
pub trait InputSourceSelector: Send {
    /// Number of selectable input sources
    fn count(&self) -> usize;

    /// Index of the active input source, if it is one of the selectable ones
    fn current(&self) -> Option<usize>;

    /// Switch to the input source at `index`
    fn try_select(&self, index: usize) -> Result<(), InputSourceError>;

    /// Switch to the input source at `index`; false when out of range or refused
    fn select(&self, index: usize) -> bool {
        match self.try_select(index) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }
}

/// Shared range check for implementations
pub fn check_index(index: usize, available: usize) -> Result<(), InputSourceError> {
    if index < available {
        Ok(())
    } else {
        Err(InputSourceError::InvalidIndex { index, available })
    }
}
