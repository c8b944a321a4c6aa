// Maccel Transform - Held Key Tracking
// Keeps a key's release consistent with how its press was handled

use smallvec::SmallVec;

use super::transformer::{remap, transform, TransformResult};
use crate::input::{extract_key_code, is_synthetic, key_action, RawKeyEvent};
use crate::{Action, KeyCode, RemappingTable};

/// What was done with a key when it went down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeldOutcome {
    PassThrough,
    Remapped(KeyCode),
    Suppressed,
}

/// Keys currently held, with the outcome chosen when they were pressed.
///
/// A table published while a key is down must not change what that key's
/// repeat and release events turn into, otherwise the destination key is
/// never released. Lives on the listener thread only.
#[derive(Debug, Default)]
pub struct HeldRemaps {
    held: SmallVec<[(KeyCode, HeldOutcome); 16]>,
}

impl HeldRemaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform `event`, pinning held keys to their press-time outcome
    pub fn resolve(&mut self, event: &RawKeyEvent, table: &RemappingTable) -> TransformResult {
        if is_synthetic(event) {
            return TransformResult::Unchanged(*event);
        }
        let (Some(key), Some(action)) = (extract_key_code(event), key_action(event)) else {
            return transform(event, table);
        };

        match action {
            Action::Press => {
                let result = transform(event, table);
                self.remember(key, outcome_of(&result));
                result
            }
            Action::Repeat => match self.position(key) {
                Some(i) => apply(self.held[i].1, event, key),
                None => transform(event, table),
            },
            Action::Release => match self.position(key) {
                Some(i) => {
                    let (_, outcome) = self.held.swap_remove(i);
                    apply(outcome, event, key)
                }
                None => transform(event, table),
            },
        }
    }

    /// Number of keys currently tracked as held
    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Check if `key` is tracked as held
    pub fn is_held(&self, key: KeyCode) -> bool {
        self.position(key).is_some()
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    fn position(&self, key: KeyCode) -> Option<usize> {
        self.held.iter().position(|(k, _)| *k == key)
    }

    fn remember(&mut self, key: KeyCode, outcome: HeldOutcome) {
        match self.position(key) {
            Some(i) => self.held[i].1 = outcome,
            None => self.held.push((key, outcome)),
        }
    }
}

fn outcome_of(result: &TransformResult) -> HeldOutcome {
    match result {
        TransformResult::Unchanged(_) => HeldOutcome::PassThrough,
        TransformResult::Mutated(e) => HeldOutcome::Remapped(e.key_code),
        TransformResult::Reinject(s) => HeldOutcome::Remapped(s.key),
        TransformResult::Tap(key) => HeldOutcome::Remapped(*key),
        TransformResult::Suppressed => HeldOutcome::Suppressed,
    }
}

fn apply(outcome: HeldOutcome, event: &RawKeyEvent, key: KeyCode) -> TransformResult {
    match outcome {
        HeldOutcome::PassThrough => TransformResult::Unchanged(*event),
        HeldOutcome::Remapped(destination) => remap(event, key, destination),
        HeldOutcome::Suppressed => TransformResult::Suppressed,
    }
}
