// Maccel Transform - Event Transformer
// Applies a remapping table lookup to a single classified event

use crate::input::{classify, extract_key_code, is_synthetic, key_action, EventCategory, RawKeyEvent};
use crate::output::SyntheticKey;
use crate::modifier;
use crate::{KeyCode, RemappingTable};

/// Result of transforming a single event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformResult {
    /// Forward the original event as-is
    Unchanged(RawKeyEvent),
    /// Forward a copy carrying the destination key code
    Mutated(RawKeyEvent),
    /// Consume the event; nothing is forwarded
    Suppressed,
    /// Consume the event and post this synthetic replacement instead
    Reinject(SyntheticKey),
    /// Consume the event and post a full press and release of this key
    Tap(KeyCode),
}

impl TransformResult {
    /// Event to forward, if any
    pub fn forwarded(&self) -> Option<&RawKeyEvent> {
        match self {
            TransformResult::Unchanged(e) | TransformResult::Mutated(e) => Some(e),
            TransformResult::Suppressed | TransformResult::Reinject(_) | TransformResult::Tap(_) => None,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, TransformResult::Unchanged(_))
    }
}

/// How a remap of one key to another can be carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapStrategy {
    /// Overwrite the key code field of a copy of the event
    InPlace,
    /// Suppress the event and synthesize the destination key.
    ///
    /// Needed when exactly one side is a modifier: a KeyDown cannot be turned
    /// into a modifier transition by changing its key code, and vice versa.
    Inject,
    /// Suppress the event and synthesize a full tap of the destination.
    ///
    /// Caps lock reports one FlagsChanged per toggle rather than one per
    /// press and release, so each of its events stands for a whole tap.
    Toggle,
}

impl RemapStrategy {
    pub fn for_pair(source: KeyCode, destination: KeyCode) -> Self {
        if source == KeyCode::CAPS_LOCK {
            RemapStrategy::Toggle
        } else if source.is_modifier() == destination.is_modifier() {
            RemapStrategy::InPlace
        } else {
            RemapStrategy::Inject
        }
    }
}

/// Transform `event` with `table`.
///
/// Synthetic events and non-keyboard events are always `Unchanged`, as is any
/// key without an entry or with an identity entry.
pub fn transform(event: &RawKeyEvent, table: &RemappingTable) -> TransformResult {
    if is_synthetic(event) {
        return TransformResult::Unchanged(*event);
    }
    let Some(key) = extract_key_code(event) else {
        return TransformResult::Unchanged(*event);
    };
    if table.is_suppressed(key) {
        return TransformResult::Suppressed;
    }
    match table.lookup(key) {
        Some(destination) => remap(event, key, destination),
        None => TransformResult::Unchanged(*event),
    }
}

/// Remap a keyboard event from `source` to `destination`
pub fn remap(event: &RawKeyEvent, source: KeyCode, destination: KeyCode) -> TransformResult {
    if source == destination || destination.to_native().is_none() {
        return TransformResult::Unchanged(*event);
    }
    let Some(action) = key_action(event) else {
        return TransformResult::Unchanged(*event);
    };

    match RemapStrategy::for_pair(source, destination) {
        RemapStrategy::InPlace => {
            let mut mutated = event.with_key_code(destination);
            if classify(event) == EventCategory::FlagsChanged {
                mutated.flags = swap_modifier_flags(event.flags, source, destination, action.is_down());
            }
            TransformResult::Mutated(mutated)
        }
        // Modifiers have no autorepeat; a regular key has no repeat to synthesize
        RemapStrategy::Inject if action.is_autorepeat() => TransformResult::Suppressed,
        RemapStrategy::Inject => TransformResult::Reinject(SyntheticKey::for_action(destination, action)),
        RemapStrategy::Toggle if classify(event) == EventCategory::FlagsChanged => {
            TransformResult::Tap(destination)
        }
        RemapStrategy::Toggle => TransformResult::Suppressed,
    }
}

/// Move the source key's bits over to the destination key.
///
/// Shared bits still backed by the other side's device bit are kept.
fn swap_modifier_flags(flags: u64, source: KeyCode, destination: KeyCode, pressed: bool) -> u64 {
    let released = modifier::with_key(flags, source, false);
    modifier::with_key(released, destination, pressed)
}
