//! The supercombinator symbol table.
//!
//! Maps interned global names to compiled records. Stored in an `IndexMap` so
//! the machine lays out its global table in a deterministic order, which also
//! keeps serialized snapshots stable.

use indexmap::IndexMap;

use crate::{gmachine::Code, names::NameId};

/// A compiled supercombinator: arity plus its instruction sequence.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct ScRecord {
    pub name: NameId,
    pub arity: usize,
    pub code: Code,
}

/// Name-to-supercombinator mapping shared by the whole pipeline.
///
/// Later insertions with an existing name overwrite the earlier record, which
/// is how reloading a definition shadows the previous one.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub(crate) struct SymbolTable {
    records: IndexMap<NameId, ScRecord>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub fn insert(&mut self, record: ScRecord) {
        self.records.insert(record.name, record);
    }

    pub fn get(&self, name: NameId) -> Option<&ScRecord> {
        self.records.get(&name)
    }

    pub fn contains(&self, name: NameId) -> bool {
        self.records.contains_key(&name)
    }

    /// Iterates records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ScRecord> {
        self.records.values()
    }
}
