//! Dynamic scalar values held by a preference namespace.

use std::collections::BTreeSet;
use std::fmt;

/// A single preference value.
///
/// Mirrors the scalar kinds a platform preference file can hold. Only
/// [`PrefValue::Text`] and [`PrefValue::Int`] are used by the keychain
/// itself; the remaining kinds exist because legacy namespaces may contain
/// them.
#[derive(Debug, Clone, PartialEq)]
pub enum PrefValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    TextSet(BTreeSet<String>),
}

impl PrefValue {
    /// Stable name of the value kind, as persisted in the `kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::TextSet(_) => "text_set",
        }
    }

    /// Borrow the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Return the integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::TextSet(set) => {
                let items: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}
