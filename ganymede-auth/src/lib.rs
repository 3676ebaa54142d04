// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission algebra of the Ganymede directory-management system.
//!
//! Access to object bases and their fields is expressed with [`PermEntry`] values (visible,
//! editable, creatable, deletable) arranged in sparse [`PermMatrix`] maps. The matrices of all
//! roles a session holds are merged with [`PermMatrix::union`], during which field entries inherit
//! what the other matrix grants on their base.
//!
//! [`FieldOptionMatrix`] uses the same keys to attach sync channel options to bases and fields.
mod field_options;
mod matrix_key;
mod perm_entry;
mod perm_matrix;

pub use field_options::{FieldOptionMatrix, SyncPref, SyncPrefError};
pub use matrix_key::{MatrixKey, MatrixKeyError};
pub use perm_entry::{PERM_ENTRY_LEN, PermEntry, PermEntryError};
pub use perm_matrix::PermMatrix;
