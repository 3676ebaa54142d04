// SPDX-License-Identifier: MIT OR Apache-2.0

//! Basic per-object and per-field access control bits.
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size in bytes of a binary permission record, including its size prefix.
pub const PERM_ENTRY_LEN: usize = 6;

const VISIBLE: u8 = 1;
const EDITABLE: u8 = 2;
const CREATE: u8 = 4;
const DELETE: u8 = 8;

/// Immutable combination of the four permission bits.
///
/// All 16 possible combinations exist exactly once as a static value, every constructor and set
/// operation hands out references into that table. Two entries with equal bits are therefore
/// always the same instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct PermEntry {
    bits: u8,
}

static PERM_ENTRIES: [PermEntry; 16] = {
    let mut entries = [PermEntry { bits: 0 }; 16];
    let mut index = 0;
    while index < 16 {
        entries[index] = PermEntry { bits: index as u8 };
        index += 1;
    }
    entries
};

impl PermEntry {
    /// Index of the entry which grants everything.
    pub const FULL_PERMS: u8 = 15;

    /// Index of the entry which grants nothing.
    pub const NO_PERMS: u8 = 0;

    /// Index of the entry which grants visibility only.
    pub const VIEW_PERMS: u8 = 1;

    /// Returns the canonical entry for the given bits.
    pub fn get(visible: bool, editable: bool, create: bool, delete: bool) -> &'static PermEntry {
        let mut index = 0;
        if visible {
            index |= VISIBLE;
        }
        if editable {
            index |= EDITABLE;
        }
        if create {
            index |= CREATE;
        }
        if delete {
            index |= DELETE;
        }
        Self::from_index(index)
    }

    /// Returns the canonical entry for a 4-bit index, higher bits are ignored.
    pub fn from_index(index: u8) -> &'static PermEntry {
        &PERM_ENTRIES[(index & 0x0F) as usize]
    }

    /// Visible, editable, creatable and deletable.
    pub fn full_perms() -> &'static PermEntry {
        Self::from_index(Self::FULL_PERMS)
    }

    pub fn no_perms() -> &'static PermEntry {
        Self::from_index(Self::NO_PERMS)
    }

    pub fn view_perms() -> &'static PermEntry {
        Self::from_index(Self::VIEW_PERMS)
    }

    pub fn is_visible(&self) -> bool {
        self.bits & VISIBLE != 0
    }

    pub fn is_editable(&self) -> bool {
        self.bits & EDITABLE != 0
    }

    pub fn is_creatable(&self) -> bool {
        self.bits & CREATE != 0
    }

    pub fn is_deletable(&self) -> bool {
        self.bits & DELETE != 0
    }

    /// Index into the table of canonical entries, `visible + 2 * editable + 4 * create +
    /// 8 * delete`.
    pub fn index(&self) -> u8 {
        self.bits
    }

    /// Canonical entry holding every bit set in either entry.
    ///
    /// A missing entry acts as the identity.
    pub fn union(&self, other: Option<&PermEntry>) -> &'static PermEntry {
        match other {
            Some(other) => Self::from_index(self.bits | other.bits),
            None => Self::from_index(self.bits),
        }
    }

    /// Canonical entry holding the bits set in both entries.
    ///
    /// A missing entry grants nothing, so the intersection with it grants nothing either.
    pub fn intersection(&self, other: Option<&PermEntry>) -> &'static PermEntry {
        match other {
            Some(other) => Self::from_index(self.bits & other.bits),
            None => Self::no_perms(),
        }
    }

    /// Describes how this entry differs from `other`.
    ///
    /// Lists `+bit` for every bit this entry grants which `other` lacks and `-bit` for every bit
    /// `other` grants which this entry lacks, joined by `", "`. Compared to a missing entry every
    /// bit set here counts as added.
    pub fn difference(&self, other: Option<&PermEntry>) -> String {
        let other_bits = other.map(|other| other.bits).unwrap_or(0);

        let mut changes = Vec::new();
        for (bit, name) in NAMES {
            let mine = self.bits & bit != 0;
            let theirs = other_bits & bit != 0;

            if mine && !theirs {
                changes.push(format!("+{name}"));
            } else if theirs && !mine {
                changes.push(format!("-{name}"));
            }
        }

        changes.join(", ")
    }

    /// Compact code used in XML dumps, a subset of `VECD`.
    pub fn xml_code(&self) -> String {
        XML_CODES
            .iter()
            .filter(|(bit, _)| self.bits & bit != 0)
            .map(|(_, code)| *code)
            .collect()
    }

    /// Parses a code produced by [`PermEntry::xml_code`].
    ///
    /// Letters may come in any order and either case.
    pub fn from_xml_code(code: &str) -> Result<&'static PermEntry, PermEntryError> {
        let mut index = 0;
        for letter in code.chars() {
            let bit = XML_CODES
                .iter()
                .find(|(_, known)| known.eq_ignore_ascii_case(&letter))
                .map(|(bit, _)| *bit)
                .ok_or(PermEntryError::InvalidXmlCode(letter))?;
            index |= bit;
        }
        Ok(Self::from_index(index))
    }

    /// Appends the binary record of this entry to `buf`.
    ///
    /// The record is a big-endian `i16` holding the number of flags (4), followed by one byte per
    /// flag in visible, editable, create, delete order.
    pub fn emit(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&4i16.to_be_bytes());
        buf.push(self.is_visible() as u8);
        buf.push(self.is_editable() as u8);
        buf.push(self.is_creatable() as u8);
        buf.push(self.is_deletable() as u8);
    }

    /// Reads a binary record written by [`PermEntry::emit`] and returns the canonical entry
    /// together with the number of bytes consumed.
    ///
    /// Old records only carry three flags, for those the delete flag is off.
    pub fn read(bytes: &[u8]) -> Result<(&'static PermEntry, usize), PermEntryError> {
        if bytes.len() < 5 {
            return Err(PermEntryError::TooShort(bytes.len()));
        }

        let size = i16::from_be_bytes([bytes[0], bytes[1]]);
        let visible = bytes[2] != 0;
        let editable = bytes[3] != 0;
        let create = bytes[4] != 0;

        if size >= 4 {
            let Some(delete) = bytes.get(5) else {
                return Err(PermEntryError::TooShort(bytes.len()));
            };
            Ok((Self::get(visible, editable, create, *delete != 0), PERM_ENTRY_LEN))
        } else {
            Ok((Self::get(visible, editable, create, false), 5))
        }
    }
}

const NAMES: [(u8, &str); 4] = [
    (VISIBLE, "visible"),
    (EDITABLE, "editable"),
    (CREATE, "create"),
    (DELETE, "delete"),
];

const XML_CODES: [(u8, char); 4] = [(VISIBLE, 'V'), (EDITABLE, 'E'), (CREATE, 'C'), (DELETE, 'D')];

impl Display for PermEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words: Vec<&str> = NAMES
            .iter()
            .filter(|(bit, _)| self.bits & bit != 0)
            .map(|(_, name)| *name)
            .collect();

        write!(f, "{}", words.join(" "))
    }
}

impl From<PermEntry> for u8 {
    fn from(entry: PermEntry) -> Self {
        entry.bits
    }
}

impl TryFrom<u8> for PermEntry {
    type Error = PermEntryError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        if index > Self::FULL_PERMS {
            return Err(PermEntryError::InvalidIndex(index));
        }
        Ok(*Self::from_index(index))
    }
}

/// Error types for `PermEntry` struct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermEntryError {
    /// Binary record is shorter than its size prefix announces.
    #[error("permission record too short, got {0} bytes")]
    TooShort(usize),

    /// Index does not fit into four bits.
    #[error("invalid permission index {0}")]
    InvalidIndex(u8),

    /// Letter is not one of `V`, `E`, `C` or `D`.
    #[error("invalid permission code '{0}'")]
    InvalidXmlCode(char),
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::{PermEntry, PermEntryError};

    #[test]
    fn canonical_instances() {
        for index in 0..16u8 {
            let entry = PermEntry::from_index(index);
            assert_eq!(entry.index(), index);

            let again = PermEntry::get(
                entry.is_visible(),
                entry.is_editable(),
                entry.is_creatable(),
                entry.is_deletable(),
            );
            assert!(std::ptr::eq(entry, again));
        }

        assert!(std::ptr::eq(PermEntry::full_perms(), PermEntry::from_index(15)));
        assert!(std::ptr::eq(PermEntry::no_perms(), PermEntry::from_index(0)));
        assert!(std::ptr::eq(PermEntry::view_perms(), PermEntry::get(true, false, false, false)));
    }

    #[test]
    fn union_and_intersection_are_bitwise() {
        for a in 0..16u8 {
            for b in 0..16u8 {
                let left = PermEntry::from_index(a);
                let right = PermEntry::from_index(b);

                let union = left.union(Some(right));
                assert_eq!(union.index(), a | b);
                assert!(std::ptr::eq(union, right.union(Some(left))));

                assert_eq!(left.intersection(Some(right)).index(), a & b);
            }
        }
    }

    #[test]
    fn missing_operand() {
        let entry = PermEntry::get(true, true, false, false);
        assert!(std::ptr::eq(entry.union(None), entry));
        assert!(std::ptr::eq(entry.intersection(None), PermEntry::no_perms()));
    }

    #[rstest]
    #[case(PermEntry::get(true, false, false, false), None, "+visible")]
    #[case(PermEntry::full_perms(), Some(PermEntry::full_perms()), "")]
    #[case(
        PermEntry::get(true, true, false, false),
        Some(PermEntry::get(true, false, true, false)),
        "+editable, -create"
    )]
    #[case(
        PermEntry::no_perms(),
        Some(PermEntry::full_perms()),
        "-visible, -editable, -create, -delete"
    )]
    fn difference(
        #[case] entry: &PermEntry,
        #[case] other: Option<&PermEntry>,
        #[case] expected: &str,
    ) {
        assert_eq!(entry.difference(other), expected);
    }

    #[rstest]
    #[case(0, "", "")]
    #[case(1, "visible", "V")]
    #[case(5, "visible create", "VC")]
    #[case(10, "editable delete", "ED")]
    #[case(15, "visible editable create delete", "VECD")]
    fn text_forms(#[case] index: u8, #[case] words: &str, #[case] xml: &str) {
        let entry = PermEntry::from_index(index);
        assert_eq!(entry.to_string(), words);
        assert_eq!(entry.xml_code(), xml);
        assert!(std::ptr::eq(PermEntry::from_xml_code(xml).unwrap(), entry));
    }

    #[test]
    fn invalid_xml_code() {
        assert!(std::ptr::eq(
            PermEntry::from_xml_code("dv").unwrap(),
            PermEntry::from_index(9)
        ));
        assert_matches!(
            PermEntry::from_xml_code("VX"),
            Err(PermEntryError::InvalidXmlCode('X'))
        );
    }

    #[test]
    fn binary_record() {
        let entry = PermEntry::get(true, false, true, true);

        let mut buf = Vec::new();
        entry.emit(&mut buf);
        assert_eq!(buf, [0, 4, 1, 0, 1, 1]);

        let (read, consumed) = PermEntry::read(&buf).unwrap();
        assert!(std::ptr::eq(read, entry));
        assert_eq!(consumed, 6);
    }

    #[test]
    fn legacy_binary_record() {
        let (read, consumed) = PermEntry::read(&[0, 3, 1, 1, 1]).unwrap();
        assert_eq!(read.index(), 7);
        assert!(!read.is_deletable());
        assert_eq!(consumed, 5);

        assert_matches!(PermEntry::read(&[0, 4, 1]), Err(PermEntryError::TooShort(3)));
        assert_matches!(PermEntry::read(&[0, 4, 1, 1, 1]), Err(PermEntryError::TooShort(5)));
    }

    #[test]
    fn serde_as_index() {
        let entry = PermEntry::get(true, true, false, false);
        assert_eq!(serde_json::to_string(entry).unwrap(), "3");
        assert_eq!(serde_json::from_str::<PermEntry>("3").unwrap(), *entry);
        assert!(serde_json::from_str::<PermEntry>("16").is_err());
    }
}
