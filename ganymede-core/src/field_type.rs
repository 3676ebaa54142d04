// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data types a field of an object base can hold.
///
/// Every type is identified on the wire by a numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum FieldType {
    /// True or false.
    Boolean,

    /// 32-bit signed integer.
    Numeric,

    /// Point in time, millisecond precision.
    Date,

    /// Text string, optionally constrained.
    String,

    /// Pointer to another object.
    Invid,

    /// Permission matrix, see `ganymede-auth`.
    PermissionMatrix,

    /// Hashed or plaintext password.
    Password,

    /// IPv4 or IPv6 address.
    Ip,

    /// Double precision floating point number.
    Float,

    /// Per-object sync channel options.
    FieldOptions,
}

impl FieldType {
    pub const BOOLEAN: i16 = 0;
    pub const NUMERIC: i16 = 1;
    pub const DATE: i16 = 2;
    pub const STRING: i16 = 3;
    pub const INVID: i16 = 4;
    pub const PERMISSIONMATRIX: i16 = 5;
    pub const PASSWORD: i16 = 6;
    pub const IP: i16 = 7;
    pub const FLOAT: i16 = 8;
    pub const FIELDOPTIONS: i16 = 9;

    /// Returns the numeric code of this type.
    pub fn code(&self) -> i16 {
        match self {
            FieldType::Boolean => Self::BOOLEAN,
            FieldType::Numeric => Self::NUMERIC,
            FieldType::Date => Self::DATE,
            FieldType::String => Self::STRING,
            FieldType::Invid => Self::INVID,
            FieldType::PermissionMatrix => Self::PERMISSIONMATRIX,
            FieldType::Password => Self::PASSWORD,
            FieldType::Ip => Self::IP,
            FieldType::Float => Self::FLOAT,
            FieldType::FieldOptions => Self::FIELDOPTIONS,
        }
    }

    /// Looks up a type by its numeric code.
    pub fn from_code(code: i16) -> Result<Self, FieldTypeError> {
        match code {
            Self::BOOLEAN => Ok(FieldType::Boolean),
            Self::NUMERIC => Ok(FieldType::Numeric),
            Self::DATE => Ok(FieldType::Date),
            Self::STRING => Ok(FieldType::String),
            Self::INVID => Ok(FieldType::Invid),
            Self::PERMISSIONMATRIX => Ok(FieldType::PermissionMatrix),
            Self::PASSWORD => Ok(FieldType::Password),
            Self::IP => Ok(FieldType::Ip),
            Self::FLOAT => Ok(FieldType::Float),
            Self::FIELDOPTIONS => Ok(FieldType::FieldOptions),
            code => Err(FieldTypeError::InvalidCode(code)),
        }
    }

    /// Returns the string representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Numeric => "numeric",
            FieldType::Date => "date",
            FieldType::String => "string",
            FieldType::Invid => "invid",
            FieldType::PermissionMatrix => "permmatrix",
            FieldType::Password => "password",
            FieldType::Ip => "ip",
            FieldType::Float => "float",
            FieldType::FieldOptions => "options",
        }
    }
}

impl From<FieldType> for i16 {
    fn from(field_type: FieldType) -> Self {
        field_type.code()
    }
}

impl TryFrom<i16> for FieldType {
    type Error = FieldTypeError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl FromStr for FieldType {
    type Err = FieldTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(FieldType::Boolean),
            "numeric" => Ok(FieldType::Numeric),
            "date" => Ok(FieldType::Date),
            "string" => Ok(FieldType::String),
            "invid" => Ok(FieldType::Invid),
            "permmatrix" => Ok(FieldType::PermissionMatrix),
            "password" => Ok(FieldType::Password),
            "ip" => Ok(FieldType::Ip),
            "float" => Ok(FieldType::Float),
            "options" => Ok(FieldType::FieldOptions),
            type_str => Err(FieldTypeError::InvalidName(type_str.into())),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for `FieldType` enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldTypeError {
    /// Numeric code does not name a field type.
    #[error("unknown field type code {0}")]
    InvalidCode(i16),

    /// String does not name a field type.
    #[error("unknown field type '{0}'")]
    InvalidName(String),
}
