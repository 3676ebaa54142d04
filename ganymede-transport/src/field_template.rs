// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side snapshots of field definitions.
use std::fmt;

use ganymede_core::FieldType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server-side field definition a [`FieldTemplate`] can be taken from.
///
/// Type specific attributes have defaults so definitions only implement what applies to them.
pub trait FieldDefinition {
    fn name(&self) -> &str;

    fn comment(&self) -> Option<&str>;

    fn field_type(&self) -> FieldType;

    fn field_id(&self) -> i16;

    /// Type id of the base holding the field.
    fn base_id(&self) -> i16;

    fn tab_name(&self) -> Option<&str>;

    fn is_array(&self) -> bool;

    fn is_built_in(&self) -> bool;

    fn max_array_size(&self) -> i16 {
        i16::MAX
    }

    /// Labels for the true and false states of a boolean field, if it is labeled.
    fn boolean_labels(&self) -> Option<(String, String)> {
        None
    }

    fn min_length(&self) -> i16 {
        0
    }

    fn max_length(&self) -> i16 {
        i16::MAX
    }

    fn ok_chars(&self) -> Option<&str> {
        None
    }

    fn bad_chars(&self) -> Option<&str> {
        None
    }

    fn is_multi_line(&self) -> bool {
        false
    }

    fn regexp_pattern(&self) -> Option<&str> {
        None
    }

    fn is_edit_in_place(&self) -> bool {
        false
    }

    /// Base the field may point to, `-1` if any.
    fn target_base(&self) -> i16 {
        -1
    }
}

/// Error types for `FieldTemplate`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldTemplateError {
    /// Invid attributes were requested from a field of another type.
    #[error("field {0} is not an invid field")]
    NotInvid(String),
}

/// Serializable copy of a field definition.
///
/// Attributes which only apply to other field types keep their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTemplate {
    name: String,
    comment: Option<String>,
    field_type: FieldType,
    field_id: i16,
    base_id: i16,
    tab_name: Option<String>,
    vector: bool,
    limit: i16,
    built_in: bool,

    true_label: Option<String>,
    false_label: Option<String>,

    min_length: i16,
    max_length: i16,
    ok_chars: Option<String>,
    bad_chars: Option<String>,
    multi_line: bool,
    regexp_pattern: Option<String>,

    edit_in_place: bool,
    target_base: i16,
}

impl FieldTemplate {
    pub fn from_definition<D: FieldDefinition + ?Sized>(definition: &D) -> Self {
        let field_type = definition.field_type();
        let vector = definition.is_array();

        let mut template = Self {
            name: definition.name().to_string(),
            comment: definition.comment().map(str::to_string),
            field_type,
            field_id: definition.field_id(),
            base_id: definition.base_id(),
            tab_name: definition.tab_name().map(str::to_string),
            vector,
            limit: if vector {
                definition.max_array_size()
            } else {
                i16::MAX
            },
            built_in: definition.is_built_in(),
            true_label: None,
            false_label: None,
            min_length: 0,
            max_length: i16::MAX,
            ok_chars: None,
            bad_chars: None,
            multi_line: false,
            regexp_pattern: None,
            edit_in_place: false,
            target_base: -1,
        };

        match field_type {
            FieldType::Boolean => {
                if let Some((true_label, false_label)) = definition.boolean_labels() {
                    template.true_label = Some(true_label);
                    template.false_label = Some(false_label);
                }
            }
            FieldType::String => {
                template.min_length = definition.min_length();
                template.max_length = definition.max_length();
                template.ok_chars = definition.ok_chars().map(str::to_string);
                template.bad_chars = definition.bad_chars().map(str::to_string);
                template.multi_line = definition.is_multi_line();
                template.regexp_pattern = definition.regexp_pattern().map(str::to_string);
            }
            FieldType::Invid => {
                template.edit_in_place = definition.is_edit_in_place();
                template.target_base = definition.target_base();
            }
            _ => (),
        }

        template
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn field_id(&self) -> i16 {
        self.field_id
    }

    pub fn base_id(&self) -> i16 {
        self.base_id
    }

    pub fn tab_name(&self) -> Option<&str> {
        self.tab_name.as_deref()
    }

    pub fn is_array(&self) -> bool {
        self.vector
    }

    /// Maximum number of elements of a vector field.
    pub fn limit(&self) -> i16 {
        self.limit
    }

    pub fn is_built_in(&self) -> bool {
        self.built_in
    }

    pub fn is_boolean(&self) -> bool {
        self.field_type == FieldType::Boolean
    }

    pub fn is_numeric(&self) -> bool {
        self.field_type == FieldType::Numeric
    }

    pub fn is_date(&self) -> bool {
        self.field_type == FieldType::Date
    }

    pub fn is_string(&self) -> bool {
        self.field_type == FieldType::String
    }

    pub fn is_invid(&self) -> bool {
        self.field_type == FieldType::Invid
    }

    pub fn is_perm_matrix(&self) -> bool {
        self.field_type == FieldType::PermissionMatrix
    }

    pub fn is_password(&self) -> bool {
        self.field_type == FieldType::Password
    }

    pub fn is_ip(&self) -> bool {
        self.field_type == FieldType::Ip
    }

    pub fn is_float(&self) -> bool {
        self.field_type == FieldType::Float
    }

    pub fn is_field_options(&self) -> bool {
        self.field_type == FieldType::FieldOptions
    }

    pub fn is_labeled(&self) -> bool {
        self.true_label.is_some()
    }

    pub fn true_label(&self) -> Option<&str> {
        self.true_label.as_deref()
    }

    pub fn false_label(&self) -> Option<&str> {
        self.false_label.as_deref()
    }

    pub fn min_length(&self) -> i16 {
        self.min_length
    }

    pub fn max_length(&self) -> i16 {
        self.max_length
    }

    pub fn ok_chars(&self) -> Option<&str> {
        self.ok_chars.as_deref()
    }

    pub fn bad_chars(&self) -> Option<&str> {
        self.bad_chars.as_deref()
    }

    pub fn is_multi_line(&self) -> bool {
        self.multi_line
    }

    pub fn regexp_pattern(&self) -> Option<&str> {
        self.regexp_pattern.as_deref()
    }

    pub fn is_edit_in_place(&self) -> bool {
        self.edit_in_place
    }

    /// Base an invid field may point to, `-1` if any.
    pub fn target_base(&self) -> Result<i16, FieldTemplateError> {
        if !self.is_invid() {
            return Err(FieldTemplateError::NotInvid(self.name.clone()));
        }
        Ok(self.target_base)
    }
}

impl fmt::Display for FieldTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field template: {}<{}>", self.name, self.field_id)?;

        match self.field_type {
            FieldType::String => write!(
                f,
                " string, minlength = {}, maxlength = {}, okChars = {}, badChars = {}, regexp = {}",
                self.min_length,
                self.max_length,
                self.ok_chars.as_deref().unwrap_or("null"),
                self.bad_chars.as_deref().unwrap_or("null"),
                self.regexp_pattern.as_deref().unwrap_or("null"),
            ),
            FieldType::FieldOptions => Ok(()),
            field_type => write!(f, " {}", field_type.as_str()),
        }
    }
}
