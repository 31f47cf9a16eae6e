use chrono::Datelike;

use crate::table::schema::ColumnType;
use crate::table::table::QueryTable;
use crate::table::{QueryError, Value};

/// Boolean predicate over one record. Composable with `and`/`or`; each
/// record is evaluated independently, with no cross-record state.
///
/// Comparison against a null cell is non-matching, never an error. The only
/// predicates that see nulls are the explicit `IsNull`/`IsNotNull` tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    Eq(String, Value),
    Gt(String, Value),
    Lt(String, Value),
    Between(String, Value, Value),
    In(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    StartsWith(String, String),
    EndsWith(String, String),
    Contains(String, String),
    /// Substring alternation: matches if any of the needles occurs.
    ContainsAny(String, Vec<String>),
    Year(String, i32),
    Month(String, u32),
    Day(String, u32),
    /// Day-of-month within `min..=max`.
    DayBetween(String, u32, u32),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn eq(column: &str, value: Value) -> Self {
        Predicate::Eq(column.to_string(), value)
    }

    pub fn gt(column: &str, value: Value) -> Self {
        Predicate::Gt(column.to_string(), value)
    }

    pub fn lt(column: &str, value: Value) -> Self {
        Predicate::Lt(column.to_string(), value)
    }

    pub fn between(column: &str, low: Value, high: Value) -> Self {
        Predicate::Between(column.to_string(), low, high)
    }

    pub fn is_in(column: &str, values: Vec<Value>) -> Self {
        Predicate::In(column.to_string(), values)
    }

    pub fn is_null(column: &str) -> Self {
        Predicate::IsNull(column.to_string())
    }

    pub fn is_not_null(column: &str) -> Self {
        Predicate::IsNotNull(column.to_string())
    }

    pub fn starts_with(column: &str, prefix: &str) -> Self {
        Predicate::StartsWith(column.to_string(), prefix.to_string())
    }

    pub fn ends_with(column: &str, suffix: &str) -> Self {
        Predicate::EndsWith(column.to_string(), suffix.to_string())
    }

    pub fn contains(column: &str, needle: &str) -> Self {
        Predicate::Contains(column.to_string(), needle.to_string())
    }

    pub fn contains_any(column: &str, needles: &[&str]) -> Self {
        Predicate::ContainsAny(
            column.to_string(),
            needles.iter().map(|n| n.to_string()).collect(),
        )
    }

    pub fn year(column: &str, year: i32) -> Self {
        Predicate::Year(column.to_string(), year)
    }

    pub fn month(column: &str, month: u32) -> Self {
        Predicate::Month(column.to_string(), month)
    }

    pub fn day(column: &str, day: u32) -> Self {
        Predicate::Day(column.to_string(), day)
    }

    pub fn day_between(column: &str, min: u32, max: u32) -> Self {
        Predicate::DayBetween(column.to_string(), min, max)
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Check column names and literal types against the table schema once,
    /// before any row is evaluated. A bad predicate never half-applies.
    pub fn validate(&self, table: &QueryTable) -> Result<(), QueryError> {
        match self {
            Predicate::Eq(col, v) | Predicate::Gt(col, v) | Predicate::Lt(col, v) => {
                check_literal(table, col, v)
            }
            Predicate::Between(col, low, high) => {
                check_literal(table, col, low)?;
                check_literal(table, col, high)
            }
            Predicate::In(col, values) => {
                for v in values {
                    check_literal(table, col, v)?;
                }
                // an empty or all-null list is legal, it just matches nothing
                if values.is_empty() {
                    table.column(col).map(|_| ())
                } else {
                    Ok(())
                }
            }
            Predicate::IsNull(col) | Predicate::IsNotNull(col) => table.column(col).map(|_| ()),
            Predicate::StartsWith(col, _)
            | Predicate::EndsWith(col, _)
            | Predicate::Contains(col, _)
            | Predicate::ContainsAny(col, _) => check_type(table, col, ColumnType::Str),
            Predicate::Year(col, _)
            | Predicate::Month(col, _)
            | Predicate::Day(col, _)
            | Predicate::DayBetween(col, _, _) => check_type(table, col, ColumnType::Date),
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.validate(table)?;
                b.validate(table)
            }
        }
    }

    /// Evaluate against one record. Must be called after `validate`;
    /// evaluation itself cannot fail.
    pub fn matches(&self, table: &QueryTable, row: usize) -> bool {
        match self {
            Predicate::Eq(col, v) => cell(table, col, row)
                .map(|c| !c.is_null() && !v.is_null() && c == *v)
                .unwrap_or(false),
            Predicate::Gt(col, v) => compare(table, col, row, v, |o| o.is_gt()),
            Predicate::Lt(col, v) => compare(table, col, row, v, |o| o.is_lt()),
            Predicate::Between(col, low, high) => {
                compare(table, col, row, low, |o| o.is_ge())
                    && compare(table, col, row, high, |o| o.is_le())
            }
            Predicate::In(col, values) => cell(table, col, row)
                .map(|c| !c.is_null() && values.iter().any(|v| !v.is_null() && c == *v))
                .unwrap_or(false),
            Predicate::IsNull(col) => cell(table, col, row)
                .map(|c| c.is_null())
                .unwrap_or(false),
            Predicate::IsNotNull(col) => cell(table, col, row)
                .map(|c| !c.is_null())
                .unwrap_or(false),
            Predicate::StartsWith(col, prefix) => {
                str_cell(table, col, row).is_some_and(|s| s.starts_with(prefix))
            }
            Predicate::EndsWith(col, suffix) => {
                str_cell(table, col, row).is_some_and(|s| s.ends_with(suffix))
            }
            Predicate::Contains(col, needle) => {
                str_cell(table, col, row).is_some_and(|s| s.contains(needle))
            }
            Predicate::ContainsAny(col, needles) => str_cell(table, col, row)
                .is_some_and(|s| needles.iter().any(|n| s.contains(n.as_str()))),
            Predicate::Year(col, year) => {
                date_cell(table, col, row).is_some_and(|d| d.year() == *year)
            }
            Predicate::Month(col, month) => {
                date_cell(table, col, row).is_some_and(|d| d.month() == *month)
            }
            Predicate::Day(col, day) => {
                date_cell(table, col, row).is_some_and(|d| d.day() == *day)
            }
            Predicate::DayBetween(col, min, max) => {
                date_cell(table, col, row).is_some_and(|d| d.day() >= *min && d.day() <= *max)
            }
            Predicate::And(a, b) => a.matches(table, row) && b.matches(table, row),
            Predicate::Or(a, b) => a.matches(table, row) || b.matches(table, row),
        }
    }
}

fn cell(table: &QueryTable, column: &str, row: usize) -> Option<Value> {
    table.column(column).ok().map(|c| c.value(row))
}

fn str_cell<'a>(table: &'a QueryTable, column: &str, row: usize) -> Option<&'a str> {
    table.column(column).ok().and_then(|c| c.str_at(row))
}

fn date_cell(table: &QueryTable, column: &str, row: usize) -> Option<chrono::NaiveDate> {
    table.column(column).ok().and_then(|c| c.date_at(row))
}

fn compare(
    table: &QueryTable,
    column: &str,
    row: usize,
    literal: &Value,
    check: fn(std::cmp::Ordering) -> bool,
) -> bool {
    match cell(table, column, row) {
        Some(c) if !c.is_null() && !literal.is_null() => check(c.cmp(literal)),
        _ => false,
    }
}

fn literal_type(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Null => None,
        Value::Int(_) => Some(ColumnType::Int),
        Value::Str(_) => Some(ColumnType::Str),
        Value::Date(_) => Some(ColumnType::Date),
        Value::Time(_) => Some(ColumnType::Time),
    }
}

fn check_type(table: &QueryTable, column: &str, expected: ColumnType) -> Result<(), QueryError> {
    let actual = table.column(column)?.column_type();
    if actual == expected {
        Ok(())
    } else {
        Err(QueryError::UnsupportedPredicate {
            column: column.to_string(),
            actual,
        })
    }
}

fn check_literal(table: &QueryTable, column: &str, literal: &Value) -> Result<(), QueryError> {
    let actual = table.column(column)?.column_type();
    match literal_type(literal) {
        // a null literal is legal against any column and matches nothing
        None => Ok(()),
        Some(expected) if expected == actual => Ok(()),
        Some(expected) => Err(QueryError::TypeMismatch {
            column: column.to_string(),
            expected,
            actual,
        }),
    }
}
