//! Global-name interning.
//!
//! Every supercombinator name (user definitions, primitives, lifted `$lam`/`$case`
//! globals, synthesized constructor globals) is interned once and referred to by a
//! dense [`NameId`]. Instructions and the machine's global table index by `NameId`,
//! so lookups during execution are plain vector indexing; the string form is needed
//! only for error messages and tracing.

use ahash::AHashMap;

/// Index into the name interner's storage.
///
/// Uses `u32` to keep instruction operands small; programs never approach the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NameId(u32);

impl NameId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interner for global names.
///
/// Serialized as the bare entry list; the lookup map is rebuilt on load.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Names {
    entries: Vec<String>,
    lookup: AHashMap<String, NameId>,
}

impl Names {
    /// Creates an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a name, returning the existing id when already present.
    pub fn intern(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = NameId(u32::try_from(self.entries.len()).expect("name table exceeds u32"));
        self.entries.push(name.to_owned());
        self.lookup.insert(name.to_owned(), id);
        id
    }

    /// Returns the id of an already-interned name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NameId> {
        self.lookup.get(name).copied()
    }

    /// Returns the string form of an interned name.
    #[must_use]
    pub fn resolve(&self, id: NameId) -> &str {
        &self.entries[id.index()]
    }

    /// Number of interned names; the machine sizes its global table from this.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<String>> for Names {
    fn from(entries: Vec<String>) -> Self {
        let lookup = entries
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), NameId(u32::try_from(i).expect("name table exceeds u32"))))
            .collect();
        Self { entries, lookup }
    }
}

impl From<Names> for Vec<String> {
    fn from(names: Names) -> Self {
        names.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut names = Names::new();
        let a = names.intern("main");
        let b = names.intern("main");
        assert_eq!(a, b);
        assert_eq!(names.resolve(a), "main");
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn roundtrip_through_entry_list() {
        let mut names = Names::new();
        names.intern("I");
        names.intern("K");
        let rebuilt = Names::from(Vec::from(names.clone()));
        assert_eq!(rebuilt.get("K"), names.get("K"));
    }
}
