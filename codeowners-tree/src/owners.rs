//! Owner display strings and owner → files groupings.
//!
//! A rule's owners are joined into one display string with a single space.
//! The empty string means "unowned".

use std::collections::HashMap;

use serde::{ser::SerializeMap, Serialize, Serializer};

pub const OWNER_SEPARATOR: &str = " ";

pub fn join_owners<S: AsRef<str>>(owners: &[S]) -> String {
    let mut joined = String::new();
    for (idx, owner) in owners.iter().enumerate() {
        if idx > 0 {
            joined.push_str(OWNER_SEPARATOR);
        }
        joined.push_str(owner.as_ref());
    }
    joined
}

/// Split an owner display string back into owner tokens. Commas are
/// stripped, so strings joined with ", " split the same way.
pub fn split_owners(owner: &str) -> impl Iterator<Item = &str> {
    owner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

/// Paths grouped by their owner display string. Owners are kept in the
/// order they were first seen and each owner's paths in insertion order.
///
/// Serializes as a JSON-style map from owner to list of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerMap {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl OwnerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, owner: impl Into<String>, path: impl Into<String>) {
        let owner = owner.into();
        let idx = match self.index.get(&owner) {
            Some(&idx) => idx,
            None => {
                self.index.insert(owner.clone(), self.entries.len());
                self.entries.push((owner, Vec::new()));
                self.entries.len() - 1
            }
        };
        self.entries[idx].1.push(path.into());
    }

    pub fn get(&self, owner: &str) -> Option<&[String]> {
        self.index
            .get(owner)
            .map(|&idx| self.entries[idx].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(owner, paths)| (owner.as_str(), paths.as_slice()))
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(owner, _)| owner.as_str())
    }

    /// Number of distinct owners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for OwnerMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (owner, paths) in &self.entries {
            map.serialize_entry(owner, paths)?;
        }
        map.end()
    }
}
