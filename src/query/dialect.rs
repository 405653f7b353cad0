#![forbid(unsafe_code)]

//! SQL dialect strategy and parameter value representation.
//!
//! One filter-composition algorithm serves both storage backends; the
//! dialect only decides placeholder syntax, whether set membership uses an
//! array parameter (`= ANY($n)`) or an expanded `IN (?n, ?m)`, and the
//! full-text predicate shape.

use serde::Serialize;

/// A positional query parameter value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// 64-bit integer.
    Int(i64),
    /// Double-precision float.
    Float(f64),
    /// Text value.
    Text(String),
    /// Text array, bound as a single array parameter (Postgres only).
    TextList(Vec<String>),
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Float(value)
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_owned())
    }
}

/// The supported SQL dialects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SqlDialect {
    /// Postgres: `$1, $2, ...` placeholders, array parameters, tsvector
    /// full text.
    Postgres,
    /// SQLite: `?1, ?2, ...` placeholders, expanded `IN` lists, FTS5 full
    /// text.
    Sqlite,
}

impl SqlDialect {
    /// Placeholder text for the 1-based parameter position.
    pub(crate) fn placeholder(self, position: usize) -> String {
        match self {
            SqlDialect::Postgres => format!("${position}"),
            SqlDialect::Sqlite => format!("?{position}"),
        }
    }

    /// Whether a text list binds as a single array parameter.
    pub(crate) fn supports_array_parameters(self) -> bool {
        matches!(self, SqlDialect::Postgres)
    }
}
