#![forbid(unsafe_code)]

//! Parameterized-SQL accumulator.
//!
//! Builds statement text and the positional value list together so that
//! placeholder numbering always matches the value order. Fragments must be
//! appended in the contract's fixed filter order; the builder itself is
//! order-agnostic.

use crate::query::dialect::{QueryValue, SqlDialect};

/// A ready-to-execute parameterized statement.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlStatement {
    /// Statement text with dialect-specific positional placeholders.
    pub text: String,
    /// Positional parameter values, 1-based to match the placeholders.
    pub values: Vec<QueryValue>,
}

/// Accumulates SQL text and positional values.
pub(crate) struct SqlBuilder {
    dialect: SqlDialect,
    text: String,
    values: Vec<QueryValue>,
    conditions: usize,
}

impl SqlBuilder {
    pub(crate) fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            text: String::new(),
            values: Vec::new(),
            conditions: 0,
        }
    }

    pub(crate) fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Appends a raw fragment, separated from the existing text by one
    /// space.
    pub(crate) fn sql(&mut self, fragment: &str) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(fragment);
    }

    /// Registers a value and returns its placeholder text.
    pub(crate) fn add_value(&mut self, value: QueryValue) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    /// Appends a WHERE condition, prefixing `WHERE` for the first one and
    /// `AND` afterwards.
    pub(crate) fn condition(&mut self, condition: &str) {
        if self.conditions == 0 {
            self.sql("WHERE");
        } else {
            self.sql("AND");
        }
        self.sql(condition);
        self.conditions += 1;
    }

    /// Appends a set-membership condition on `column`. A singleton becomes
    /// an equality; multiple values become `= ANY($n)` with one array
    /// parameter or an expanded `IN (?n, ?m, ...)` depending on the
    /// dialect.
    pub(crate) fn condition_value_in(&mut self, column: &str, items: Vec<String>) {
        debug_assert!(!items.is_empty());
        if items.len() == 1 {
            let placeholder = self.add_value(QueryValue::Text(
                items.into_iter().next().unwrap_or_default(),
            ));
            self.condition(&format!("{column} = {placeholder}"));
        } else if self.dialect.supports_array_parameters() {
            let placeholder = self.add_value(QueryValue::TextList(items));
            self.condition(&format!("{column} = ANY({placeholder})"));
        } else {
            let placeholders: Vec<String> = items
                .into_iter()
                .map(|item| self.add_value(QueryValue::Text(item)))
                .collect();
            self.condition(&format!("{column} IN ({})", placeholders.join(", ")));
        }
    }

    pub(crate) fn finish(self) -> SqlStatement {
        SqlStatement {
            text: self.text,
            values: self.values,
        }
    }
}
