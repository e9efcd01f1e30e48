use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Ordered `(field, value)` pairs of one row
pub type FieldValues = Vec<(String, String)>;

/// Builds a [`FieldValues`] from borrowed pairs
pub fn field_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> FieldValues
where
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

/// Row mutation carried by a pending change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// One or more fields written
    Set,
    /// Row removed
    Del,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Set => "SET",
            Operation::Del => "DEL",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operation: {0}")]
pub struct ParseOperationError(pub String);

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SET" => Ok(Operation::Set),
            "DEL" => Ok(Operation::Del),
            other => Err(ParseOperationError(other.to_string())),
        }
    }
}

/// `(key, operation, fields)` as delivered by a consumer `pop()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyOpFieldValues {
    pub key: String,
    pub op: Operation,
    pub fields: FieldValues,
}

impl KeyOpFieldValues {
    pub fn set(
        key: impl Into<String>,
        fields: FieldValues,
    ) -> Self {
        Self {
            key: key.into(),
            op: Operation::Set,
            fields,
        }
    }

    pub fn del(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: Operation::Del,
            fields: Vec::new(),
        }
    }

    /// Builds the entry a coalescing consumer reports for a row read back
    /// from the store: an absent or empty row is a delete.
    pub(crate) fn from_row(
        key: String,
        row: FieldValues,
    ) -> Self {
        if row.is_empty() {
            Self::del(key)
        } else {
            Self::set(key, row)
        }
    }

    pub fn into_tuple(self) -> (String, Operation, FieldValues) {
        (self.key, self.op, self.fields)
    }
}
