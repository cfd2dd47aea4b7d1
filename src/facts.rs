//! Accumulating store of fact-statements keyed by source-turn identity.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::parse::Statement;

/// A mapping from source-turn identity to the statements extracted from
/// that turn.
///
/// Re-recording a key overwrites its previous list (last write wins per
/// key, not per statement), so merging the same source twice is
/// idempotent. The de-duplicated union of all stored statements is the
/// evidence set used for validation; it is recomputed on demand since
/// the store is small and mutated rarely per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactStore {
    entries: HashMap<String, Vec<Statement>>,
    /// Keys in first-recorded order, for a deterministic evidence set.
    order: Vec<String>,
}

impl FactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the statements for a source-turn identity.
    pub fn record(&mut self, identity: impl Into<String>, statements: Vec<Statement>) {
        let identity = identity.into();
        if !self.entries.contains_key(&identity) {
            self.order.push(identity.clone());
        }
        self.entries.insert(identity, statements);
    }

    /// Whether a source-turn identity has already been processed.
    pub fn is_known(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    /// Merge another collection of entries into this store, overwriting
    /// per key.
    pub fn merge(&mut self, entries: HashMap<String, Vec<Statement>>) {
        // HashMap iteration order is arbitrary; sort for a stable
        // first-recorded order when several new keys arrive at once.
        let mut incoming: Vec<_> = entries.into_iter().collect();
        incoming.sort_by(|a, b| a.0.cmp(&b.0));
        for (identity, statements) in incoming {
            self.record(identity, statements);
        }
    }

    /// The de-duplicated union of all stored statements, in
    /// first-recorded order.
    pub fn evidence_set(&self) -> Vec<Statement> {
        let mut seen = HashSet::new();
        let mut evidence = Vec::new();
        for identity in &self.order {
            for statement in &self.entries[identity] {
                if seen.insert(statement.clone()) {
                    evidence.push(statement.clone());
                }
            }
        }
        evidence
    }

    /// Number of recorded source turns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no source turn has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
