// Maccel Mapping Structures
// RemappingPair, RemappingTable, SharedTable

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::KeyCode;

/// One source → destination entry of a remapping configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemappingPair {
    pub source: KeyCode,
    pub destination: KeyCode,
}

impl RemappingPair {
    pub fn new(source: impl Into<KeyCode>, destination: impl Into<KeyCode>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// An identity pair is permitted but never changes an event
    pub fn is_identity(&self) -> bool {
        self.source == self.destination
    }
}

impl fmt::Display for RemappingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Immutable key remapping table.
///
/// Built once per configuration change and never modified after it has been
/// published; a new configuration produces a new table. Duplicate sources
/// resolve last-write-wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemappingTable {
    mappings: HashMap<KeyCode, KeyCode>,
    suppressed: HashSet<KeyCode>,
    input_source_taps: HashMap<KeyCode, usize>,
}

impl RemappingTable {
    /// Create an empty table (every event passes through)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from an ordered sequence of pairs
    pub fn build<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = RemappingPair>,
    {
        let mappings = pairs
            .into_iter()
            .map(|pair| (pair.source, pair.destination))
            .collect();
        Self {
            mappings,
            ..Self::default()
        }
    }

    /// Keys whose events are consumed instead of remapped
    pub fn with_suppressed<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = KeyCode>,
    {
        self.suppressed.extend(keys);
        self
    }

    /// Keys that switch to an input source when tapped on their own
    pub fn with_input_source_taps<I>(mut self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (KeyCode, usize)>,
    {
        self.input_source_taps.extend(bindings);
        self
    }

    /// Destination for `key`, or `None` when the key passes through unchanged
    pub fn lookup(&self, key: KeyCode) -> Option<KeyCode> {
        self.mappings.get(&key).copied()
    }

    /// Check if events for `key` are consumed
    pub fn is_suppressed(&self, key: KeyCode) -> bool {
        self.suppressed.contains(&key)
    }

    /// Input source bound to a short press of `key`
    pub fn input_source_for(&self, key: KeyCode) -> Option<usize> {
        self.input_source_taps.get(&key).copied()
    }

    /// Number of remap entries
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True when the table has no remaps, suppressions or bindings
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty() && self.suppressed.is_empty() && self.input_source_taps.is_empty()
    }

    /// Remap entries sorted by source code
    pub fn pairs(&self) -> Vec<RemappingPair> {
        let mut pairs: Vec<_> = self
            .mappings
            .iter()
            .map(|(s, d)| RemappingPair::new(*s, *d))
            .collect();
        pairs.sort_by_key(|p| p.source);
        pairs
    }
}

/// Atomically replaceable reference to the current table.
///
/// Readers get a consistent snapshot without ever blocking; `store` swaps the
/// whole table so a reader sees either the old or the new table in full.
#[derive(Debug, Clone)]
pub struct SharedTable {
    inner: Arc<ArcSwap<RemappingTable>>,
}

impl SharedTable {
    pub fn new(table: RemappingTable) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    /// Snapshot of the current table
    pub fn load(&self) -> Guard<Arc<RemappingTable>> {
        self.inner.load()
    }

    /// Owned handle to the current table
    pub fn snapshot(&self) -> Arc<RemappingTable> {
        self.inner.load_full()
    }

    /// Publish a replacement table
    pub fn store(&self, table: RemappingTable) {
        self.inner.store(Arc::new(table));
    }
}

impl Default for SharedTable {
    fn default() -> Self {
        Self::new(RemappingTable::empty())
    }
}
