use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

pub mod column;
pub mod loader;
pub mod predicate;
pub mod query;
pub mod schema;
#[allow(clippy::module_inception)]
pub mod table;

use schema::ColumnType;

/// Fatal errors raised while loading and validating a source file.
///
/// Any of these aborts the whole load; the table never holds a partially
/// accepted file.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing header line")]
    MissingHeader,

    #[error("header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row {row}: expected {expected} fields, got {got}")]
    FieldCount {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("column '{column}', row {row}: cannot coerce '{value}' to {expected}")]
    Coercion {
        column: String,
        row: usize,
        value: String,
        expected: ColumnType,
    },

    #[error("column '{column}', row {row}: value is not valid UTF-8")]
    Utf8 { column: String, row: usize },

    #[error("column '{column}', row {row}: null in non-nullable column")]
    NullNotAllowed { column: String, row: usize },

    #[error(
        "column '{column}', row {row}: '{value}' fails length check ({min}..={max} characters)"
    )]
    Length {
        column: String,
        row: usize,
        value: String,
        min: usize,
        max: usize,
    },
}

/// Non-fatal query errors. A failed query leaves the table untouched.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("column '{column}' has type {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },

    #[error("predicate not supported on column '{column}' of type {actual}")]
    UnsupportedPredicate { column: String, actual: ColumnType },

    #[error("cannot sum non-integer column '{0}'")]
    NonNumericSum(String),

    #[error("cannot assign null to non-nullable column '{0}'")]
    NullNotAllowed(String),

    #[error("column '{column}': '{value}' fails length check ({min}..={max} characters)")]
    LengthOutOfRange {
        column: String,
        value: String,
        min: usize,
        max: usize,
    },

    #[error("row {0} out of bounds")]
    RowOutOfBounds(usize),

    #[error("key {0} not found")]
    KeyNotFound(Value),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// One cell of the table. Null is a first-class value, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Int(i64),
    Str(String),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn variant_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) => 1,
            Value::Str(_) => 2,
            Value::Date(_) => 3,
            Value::Time(_) => 4,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Total order so sorting over a whole column is always defined: nulls sort
// first, values of the same type sort naturally.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Time(a), Value::Time(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<NA>"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::Time(v) => write!(f, "{}", v.format("%H:%M:%S")),
        }
    }
}

/// Aggregate operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// Count records, nulls included
    CountRows,
    /// Count non-null values only
    CountValues,
    /// Sum of non-null values, integer columns only
    Sum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_order_is_total() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2015, 3, 1).unwrap());
        let mut values = vec![
            Value::Str("b".to_string()),
            Value::Int(3),
            Value::Null,
            date.clone(),
            Value::Int(1),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(1),
                Value::Int(3),
                Value::Str("b".to_string()),
                date,
            ]
        );
    }

    #[test]
    fn null_displays_as_na() {
        assert_eq!(Value::Null.to_string(), "<NA>");
        assert_eq!(Value::Int(42).to_string(), "42");
    }
}
