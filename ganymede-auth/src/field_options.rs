// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-base and per-field option strings, used to configure sync channels.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix_key::{MatrixKey, MatrixKeyError};

/// Standard sync channel option values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncPref {
    /// Never write the field to the channel.
    Never,

    /// Always write the field when the object is written.
    Always,

    /// Write the field only if it changed.
    WhenChanged,
}

impl SyncPref {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPref::Never => "Never",
            SyncPref::Always => "Always",
            SyncPref::WhenChanged => "When Changed",
        }
    }
}

impl fmt::Display for SyncPref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPref {
    type Err = SyncPrefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Never" => Ok(SyncPref::Never),
            "Always" => Ok(SyncPref::Always),
            "When Changed" => Ok(SyncPref::WhenChanged),
            value => Err(SyncPrefError(value.to_string())),
        }
    }
}

/// Option string is not one of the standard sync preferences.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown sync preference '{0}'")]
pub struct SyncPrefError(pub String);

/// Map of base and field keys to opaque option strings.
///
/// Uses the same key scheme as [`PermMatrix`](crate::PermMatrix). Options are not merged, the
/// matrix is a plain lookup table.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    into = "BTreeMap<String, String>",
    try_from = "BTreeMap<String, String>"
)]
pub struct FieldOptionMatrix {
    matrix: HashMap<MatrixKey, String>,
}

impl FieldOptionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(matrix: HashMap<MatrixKey, String>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &HashMap<MatrixKey, String> {
        &self.matrix
    }

    /// Option stored for a field, without falling back to its base.
    pub fn get_option(&self, base: i16, field: i16) -> Option<&str> {
        self.matrix
            .get(&MatrixKey::field(base, field))
            .map(String::as_str)
    }

    pub fn get_base_option(&self, base: i16) -> Option<&str> {
        self.matrix.get(&MatrixKey::Base(base)).map(String::as_str)
    }

    /// Option which applies to a field, inheriting from its base when the field has none.
    pub fn effective_option(&self, base: i16, field: i16) -> Option<&str> {
        self.get_option(base, field).or_else(|| self.get_base_option(base))
    }

    /// Effective option of a field read as a standard sync preference.
    ///
    /// Returns `None` if no option applies, an error if the option is not a standard value.
    pub fn option_pref(&self, base: i16, field: i16) -> Option<Result<SyncPref, SyncPrefError>> {
        self.effective_option(base, field).map(|option| option.parse())
    }

    pub fn set_option(
        &mut self,
        base: i16,
        field: i16,
        option: impl Into<String>,
    ) -> Option<String> {
        self.matrix.insert(MatrixKey::field(base, field), option.into())
    }

    pub fn set_base_option(&mut self, base: i16, option: impl Into<String>) -> Option<String> {
        self.matrix.insert(MatrixKey::Base(base), option.into())
    }

    pub fn remove(&mut self, key: &MatrixKey) -> Option<String> {
        self.matrix.remove(key)
    }

    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MatrixKey, &str)> {
        self.matrix.iter().map(|(key, option)| (key, option.as_str()))
    }
}

impl fmt::Display for FieldOptionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(&MatrixKey, &String)> = self.matrix.iter().collect();
        entries.sort_by_key(|(key, _)| **key);

        writeln!(f, "FieldOptionMatrix DebugDump")?;
        for (key, option) in entries {
            writeln!(f, "{key} -- {option}")?;
        }
        Ok(())
    }
}

impl From<FieldOptionMatrix> for BTreeMap<String, String> {
    fn from(value: FieldOptionMatrix) -> Self {
        value
            .matrix
            .into_iter()
            .map(|(key, option)| (key.to_string(), option))
            .collect()
    }
}

impl TryFrom<BTreeMap<String, String>> for FieldOptionMatrix {
    type Error = MatrixKeyError;

    fn try_from(value: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        value
            .into_iter()
            .map(|(key, option)| MatrixKey::parse(&key).map(|key| (key, option)))
            .collect::<Result<HashMap<_, _>, _>>()
            .map(Self::from_map)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::{FieldOptionMatrix, SyncPref, SyncPrefError};

    #[rstest]
    #[case(SyncPref::Never, "Never")]
    #[case(SyncPref::Always, "Always")]
    #[case(SyncPref::WhenChanged, "When Changed")]
    fn sync_pref_strings(#[case] pref: SyncPref, #[case] value: &str) {
        assert_eq!(pref.to_string(), value);
        assert_eq!(value.parse::<SyncPref>().unwrap(), pref);
    }

    #[test]
    fn options_inherit_from_base() {
        let mut options = FieldOptionMatrix::new();
        options.set_base_option(4, "Always");
        options.set_option(4, 2, "Never");
        options.set_option(4, 3, "custom");

        assert_eq!(options.get_option(4, 1), None);
        assert_eq!(options.effective_option(4, 1), Some("Always"));
        assert_eq!(options.effective_option(4, 2), Some("Never"));
        assert_eq!(options.effective_option(5, 2), None);

        assert_matches!(options.option_pref(4, 1), Some(Ok(SyncPref::Always)));
        assert_matches!(options.option_pref(4, 3), Some(Err(SyncPrefError(_))));
        assert_matches!(options.option_pref(9, 9), None);
    }

    #[test]
    fn serde_and_dump() {
        let mut options = FieldOptionMatrix::new();
        options.set_base_option(1, "When Changed");
        options.set_option(1, 7, "Never");

        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(json, r#"{"1:7":"Never","1::":"When Changed"}"#);
        assert_eq!(
            serde_json::from_str::<FieldOptionMatrix>(&json).unwrap(),
            options
        );

        assert_eq!(
            options.to_string(),
            "FieldOptionMatrix DebugDump\n1:: -- When Changed\n1:7 -- Never\n"
        );
    }
}
