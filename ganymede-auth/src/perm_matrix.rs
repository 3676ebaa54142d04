// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sparse permission matrices.
//!
//! A [`PermMatrix`] maps object bases and fields of those bases to [`PermEntry`] values. A field
//! without an entry of its own inherits the entry of its base, the union of two matrices honours
//! that inheritance so that merging the matrices of several roles grants every field at least
//! what the roles grant on its base.
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matrix_key::{MatrixKey, MatrixKeyError};
use crate::perm_entry::PermEntry;

/// Map of base and field keys to permission entries.
///
/// Matrices are never changed by [`PermMatrix::union`], every merge produces a new matrix which
/// makes it safe to share them between threads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, PermEntry>",
    try_from = "BTreeMap<String, PermEntry>"
)]
pub struct PermMatrix {
    matrix: HashMap<MatrixKey, &'static PermEntry>,
}

impl PermMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix holding a copy of the given entries.
    pub fn from_map(matrix: HashMap<MatrixKey, &'static PermEntry>) -> Self {
        Self { matrix }
    }

    /// Read-only view of all entries.
    pub fn matrix(&self) -> &HashMap<MatrixKey, &'static PermEntry> {
        &self.matrix
    }

    /// Entry stored for a field, without falling back to its base.
    pub fn get_perm(&self, base: i16, field: i16) -> Option<&'static PermEntry> {
        self.get(&MatrixKey::field(base, field))
    }

    /// Entry stored for a base as a whole.
    pub fn get_base_perm(&self, base: i16) -> Option<&'static PermEntry> {
        self.get(&MatrixKey::Base(base))
    }

    /// Entry which applies to a field: its own entry if there is one, otherwise the one of its
    /// base.
    pub fn effective_perm(&self, base: i16, field: i16) -> Option<&'static PermEntry> {
        self.get_perm(base, field).or_else(|| self.get_base_perm(base))
    }

    pub fn get(&self, key: &MatrixKey) -> Option<&'static PermEntry> {
        self.matrix.get(key).copied()
    }

    /// Stores an entry for a field, returning the one it replaces.
    pub fn set_perm(
        &mut self,
        base: i16,
        field: i16,
        entry: &'static PermEntry,
    ) -> Option<&'static PermEntry> {
        self.set(MatrixKey::field(base, field), entry)
    }

    /// Stores an entry for a base, returning the one it replaces.
    pub fn set_base_perm(
        &mut self,
        base: i16,
        entry: &'static PermEntry,
    ) -> Option<&'static PermEntry> {
        self.set(MatrixKey::Base(base), entry)
    }

    pub fn set(&mut self, key: MatrixKey, entry: &'static PermEntry) -> Option<&'static PermEntry> {
        self.matrix.insert(key, entry)
    }

    pub fn remove(&mut self, key: &MatrixKey) -> Option<&'static PermEntry> {
        self.matrix.remove(key)
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MatrixKey, &'static PermEntry)> {
        self.matrix.iter().map(|(key, entry)| (key, *entry))
    }

    /// Merges two matrices into a new one.
    ///
    /// Keys present in both matrices receive the union of both entries. A field key present in
    /// only one matrix receives the union of its entry with the other matrix's entry for the
    /// field's base, if any. A base key present in only one matrix is copied. Merging with `None`
    /// returns a copy of this matrix.
    pub fn union(&self, other: Option<&PermMatrix>) -> PermMatrix {
        let Some(other) = other else {
            return self.clone();
        };

        let mut result = HashMap::with_capacity(self.matrix.len().max(other.matrix.len()));
        merge_into(&mut result, self, other);
        merge_into(&mut result, other, self);

        debug!(
            left = self.matrix.len(),
            right = other.matrix.len(),
            merged = result.len(),
            "merged permission matrices"
        );

        PermMatrix { matrix: result }
    }

    /// Human readable dump of all entries grouped by base.
    pub fn debug_dump(&self) -> String {
        let mut bases: BTreeMap<i16, Vec<(MatrixKey, &'static PermEntry)>> = BTreeMap::new();
        for (key, entry) in &self.matrix {
            bases.entry(key.base_id()).or_default().push((*key, *entry));
        }

        let mut result = String::from("PermMatrix DebugDump\n");
        for (base, mut entries) in bases {
            entries.sort_by_key(|(key, _)| *key);
            for (key, entry) in entries {
                match key.field_id() {
                    Some(field) => result.push_str(&format!("{base}:{field} -- {entry}\n")),
                    None => result.push_str(&format!("{base}:[base] -- {entry}\n")),
                }
            }
            result.push('\n');
        }

        result
    }
}

/// Adds every key of `from` to `result`, unioned with whatever `other` grants for it.
fn merge_into(
    result: &mut HashMap<MatrixKey, &'static PermEntry>,
    from: &PermMatrix,
    other: &PermMatrix,
) {
    for (key, entry) in &from.matrix {
        let merged = match other.matrix.get(key).copied() {
            Some(other_entry) => entry.union(Some(other_entry)),
            None if key.is_base() => *entry,
            None => entry.union(other.matrix.get(&key.base_key()).copied()),
        };
        result.insert(*key, merged);
    }
}

impl fmt::Display for PermMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.debug_dump())
    }
}

impl FromIterator<(MatrixKey, &'static PermEntry)> for PermMatrix {
    fn from_iter<T: IntoIterator<Item = (MatrixKey, &'static PermEntry)>>(iter: T) -> Self {
        Self {
            matrix: iter.into_iter().collect(),
        }
    }
}

impl From<PermMatrix> for BTreeMap<String, PermEntry> {
    fn from(value: PermMatrix) -> Self {
        value
            .matrix
            .into_iter()
            .map(|(key, entry)| (key.to_string(), *entry))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, PermEntry>> for PermMatrix {
    type Error = MatrixKeyError;

    fn try_from(value: BTreeMap<String, PermEntry>) -> Result<Self, Self::Error> {
        let mut matrix = HashMap::with_capacity(value.len());
        for (key, entry) in value {
            matrix.insert(MatrixKey::parse(&key)?, PermEntry::from_index(entry.index()));
        }
        Ok(Self { matrix })
    }
}
