// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Position in a permission or option matrix.
///
/// A matrix either holds a setting for a whole object base or for one field of it. The legacy
/// string form of a base key is `"<base>::"`, the one of a field key is `"<base>:<field>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatrixKey {
    /// Setting for objects of a base as a whole.
    Base(i16),

    /// Setting for a single field of a base.
    Field { base: i16, field: i16 },
}

impl MatrixKey {
    pub fn base(base: i16) -> Self {
        Self::Base(base)
    }

    pub fn field(base: i16, field: i16) -> Self {
        Self::Field { base, field }
    }

    /// Object base this key belongs to.
    pub fn base_id(&self) -> i16 {
        match self {
            MatrixKey::Base(base) => *base,
            MatrixKey::Field { base, .. } => *base,
        }
    }

    /// Field id, `None` for base keys.
    pub fn field_id(&self) -> Option<i16> {
        match self {
            MatrixKey::Base(_) => None,
            MatrixKey::Field { field, .. } => Some(*field),
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, MatrixKey::Base(_))
    }

    /// Base key a field key inherits from, base keys return themselves.
    pub fn base_key(&self) -> MatrixKey {
        MatrixKey::Base(self.base_id())
    }

    /// Parses the legacy string form.
    ///
    /// The base id is the text before the first `:`. Any key containing `::` is a base key,
    /// otherwise the field id is the text after the last `:`.
    pub fn parse(value: &str) -> Result<Self, MatrixKeyError> {
        let Some((base_str, _)) = value.split_once(':') else {
            return Err(MatrixKeyError::MissingSeparator(value.to_string()));
        };

        let base = base_str
            .parse::<i16>()
            .map_err(|_| MatrixKeyError::InvalidBase(value.to_string()))?;

        if value.contains("::") {
            return Ok(MatrixKey::Base(base));
        }

        let field_str = value.rsplit_once(':').map(|(_, field)| field).unwrap_or("");
        let field = field_str
            .parse::<i16>()
            .map_err(|_| MatrixKeyError::InvalidField(value.to_string()))?;

        Ok(MatrixKey::Field { base, field })
    }
}

impl fmt::Display for MatrixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixKey::Base(base) => write!(f, "{base}::"),
            MatrixKey::Field { base, field } => write!(f, "{base}:{field}"),
        }
    }
}

impl FromStr for MatrixKey {
    type Err = MatrixKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for MatrixKey {
    type Error = MatrixKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MatrixKey> for String {
    fn from(key: MatrixKey) -> Self {
        key.to_string()
    }
}

/// Error types for `MatrixKey` enum.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatrixKeyError {
    /// Key has no `:` at all.
    #[error("invalid matrix key '{0}', missing ':' separator")]
    MissingSeparator(String),

    /// Text before the first `:` is not a base id.
    #[error("invalid base id in matrix key '{0}'")]
    InvalidBase(String),

    /// Text after the last `:` is not a field id.
    #[error("invalid field id in matrix key '{0}'")]
    InvalidField(String),
}
