// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side snapshots of a single field of an object.
use ganymede_core::Invid;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::QueryValue;

/// Server-side field a [`FieldInfo`] is read from.
pub trait FieldSource {
    fn field_id(&self) -> i16;

    fn is_defined(&self) -> bool;

    fn is_editable(&self) -> bool;

    fn is_visible(&self) -> bool;

    fn is_vector(&self) -> bool;

    /// Textual form of a password field, `None` for every other field type.
    fn password_text(&self) -> Option<String> {
        None
    }

    /// Value of a scalar field.
    fn value(&self) -> Result<Option<QueryValue>, FieldInfoError>;

    /// Values of a vector field.
    fn values(&self) -> Result<Vec<QueryValue>, FieldInfoError>;
}

/// Error types for `FieldInfo`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldInfoError {
    /// The session may not read the field.
    #[error("permission denied reading field {0}")]
    PermissionDenied(i16),
}

/// Value carried by a [`FieldInfo`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldData {
    Scalar(Option<QueryValue>),
    Vector(Vec<QueryValue>),
}

/// Snapshot of the status and value of one field, taken in a single round trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    field_id: i16,
    defined: bool,
    editable: bool,
    visible: bool,
    value: FieldData,
}

impl FieldInfo {
    /// Reads a field. Password fields are captured as text, vector fields with all their values.
    ///
    /// Invids are canonicalised through the registered allocator.
    pub fn from_field<F: FieldSource + ?Sized>(field: &F) -> Result<Self, FieldInfoError> {
        let value = match field.password_text() {
            Some(text) => FieldData::Scalar(Some(QueryValue::Text(text))),
            None if field.is_vector() => {
                FieldData::Vector(field.values()?.into_iter().map(intern).collect())
            }
            None => FieldData::Scalar(field.value()?.map(intern)),
        };

        Ok(Self {
            field_id: field.field_id(),
            defined: field.is_defined(),
            editable: field.is_editable(),
            visible: field.is_visible(),
            value,
        })
    }

    pub fn field_id(&self) -> i16 {
        self.field_id
    }

    pub fn is_defined(&self) -> bool {
        self.defined
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn value(&self) -> &FieldData {
        &self.value
    }

    /// Invids held by the field, in order.
    pub fn invids(&self) -> Vec<&Invid> {
        let values: Vec<&QueryValue> = match &self.value {
            FieldData::Scalar(value) => value.iter().collect(),
            FieldData::Vector(values) => values.iter().collect(),
        };
        values
            .into_iter()
            .filter_map(|value| match value {
                QueryValue::Invid(invid) => Some(invid),
                _ => None,
            })
            .collect()
    }
}

fn intern(value: QueryValue) -> QueryValue {
    match value {
        QueryValue::Invid(invid) => QueryValue::Invid(invid.intern()),
        value => value,
    }
}
