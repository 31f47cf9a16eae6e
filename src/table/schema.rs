use std::fmt;

use crate::table::QueryError;

/// Declared type of a column. The loader coerces every raw field to the
/// declared type; there is no inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Str,
    Date,
    Time,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Int => "Int",
            ColumnType::Str => "Str",
            ColumnType::Date => "Date",
            ColumnType::Time => "Time",
        };
        write!(f, "{}", name)
    }
}

/// One declared column: name, type, nullability and an optional length
/// check (string columns only).
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub length: Option<(usize, usize)>,
}

impl ColumnSpec {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        ColumnSpec {
            name: name.to_string(),
            column_type,
            nullable: false,
            length: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Require the character count to fall within `min..=max`.
    pub fn with_length(mut self, min: usize, max: usize) -> Self {
        self.length = Some((min, max));
        self
    }
}

/// Ordered set of column declarations; the order must match the file header.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Schema { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn position(&self, name: &str) -> Result<usize, QueryError> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| QueryError::MissingColumn(name.to_string()))
    }

    pub fn spec(&self, name: &str) -> Result<&ColumnSpec, QueryError> {
        let pos = self.position(name)?;
        Ok(&self.columns[pos])
    }
}
