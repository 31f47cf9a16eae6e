use chrono::{NaiveDate, NaiveTime};

use crate::table::schema::ColumnType;
use crate::table::{QueryError, Value};

/// Typed column storage. Every cell is optional; a `None` is the null
/// representation the loader produces for sentinel tokens and empty fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<Option<i64>>),
    Str(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
    Time(Vec<Option<NaiveTime>>),
}

impl Column {
    pub fn new(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Int => Column::Int(Vec::new()),
            ColumnType::Str => Column::Str(Vec::new()),
            ColumnType::Date => Column::Date(Vec::new()),
            ColumnType::Time => Column::Time(Vec::new()),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int(_) => ColumnType::Int,
            Column::Str(_) => ColumnType::Str,
            Column::Date(_) => ColumnType::Date,
            Column::Time(_) => ColumnType::Time,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Date(v) => v.len(),
            Column::Time(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell at `idx` as an owned `Value`. Out-of-range reads are a caller
    /// bug, guarded at the table layer.
    pub fn value(&self, idx: usize) -> Value {
        match self {
            Column::Int(v) => v[idx].map(Value::Int).unwrap_or(Value::Null),
            Column::Str(v) => v[idx].clone().map(Value::Str).unwrap_or(Value::Null),
            Column::Date(v) => v[idx].map(Value::Date).unwrap_or(Value::Null),
            Column::Time(v) => v[idx].map(Value::Time).unwrap_or(Value::Null),
        }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        match self {
            Column::Int(v) => v[idx].is_none(),
            Column::Str(v) => v[idx].is_none(),
            Column::Date(v) => v[idx].is_none(),
            Column::Time(v) => v[idx].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Int(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Str(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Date(v) => v.iter().filter(|c| c.is_none()).count(),
            Column::Time(v) => v.iter().filter(|c| c.is_none()).count(),
        }
    }

    pub fn str_at(&self, idx: usize) -> Option<&str> {
        match self {
            Column::Str(v) => v[idx].as_deref(),
            _ => None,
        }
    }

    pub fn date_at(&self, idx: usize) -> Option<NaiveDate> {
        match self {
            Column::Date(v) => v[idx],
            _ => None,
        }
    }

    /// Assign one cell. The value must match the column type; `Null` is
    /// always accepted at this layer (nullability is a schema concern).
    pub fn set(&mut self, idx: usize, value: &Value) -> Result<(), QueryError> {
        let actual = self.column_type();
        let mismatch = |expected: ColumnType| QueryError::TypeMismatch {
            column: String::new(),
            expected,
            actual,
        };
        match (self, value) {
            (Column::Int(v), Value::Int(x)) => v[idx] = Some(*x),
            (Column::Str(v), Value::Str(x)) => v[idx] = Some(x.clone()),
            (Column::Date(v), Value::Date(x)) => v[idx] = Some(*x),
            (Column::Time(v), Value::Time(x)) => v[idx] = Some(*x),
            (Column::Int(v), Value::Null) => v[idx] = None,
            (Column::Str(v), Value::Null) => v[idx] = None,
            (Column::Date(v), Value::Null) => v[idx] = None,
            (Column::Time(v), Value::Null) => v[idx] = None,
            (_, Value::Int(_)) => return Err(mismatch(ColumnType::Int)),
            (_, Value::Str(_)) => return Err(mismatch(ColumnType::Str)),
            (_, Value::Date(_)) => return Err(mismatch(ColumnType::Date)),
            (_, Value::Time(_)) => return Err(mismatch(ColumnType::Time)),
        }
        Ok(())
    }

    pub fn push_int(&mut self, value: Option<i64>) {
        match self {
            Column::Int(v) => v.push(value),
            _ => unreachable!("loader pushes follow the declared schema"),
        }
    }

    pub fn push_str(&mut self, value: Option<String>) {
        match self {
            Column::Str(v) => v.push(value),
            _ => unreachable!("loader pushes follow the declared schema"),
        }
    }

    pub fn push_date(&mut self, value: Option<NaiveDate>) {
        match self {
            Column::Date(v) => v.push(value),
            _ => unreachable!("loader pushes follow the declared schema"),
        }
    }

    pub fn push_time(&mut self, value: Option<NaiveTime>) {
        match self {
            Column::Time(v) => v.push(value),
            _ => unreachable!("loader pushes follow the declared schema"),
        }
    }

    /// New column containing only the cells at `rows`, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Column {
        match self {
            Column::Int(v) => Column::Int(rows.iter().map(|&i| v[i]).collect()),
            Column::Str(v) => Column::Str(rows.iter().map(|&i| v[i].clone()).collect()),
            Column::Date(v) => Column::Date(rows.iter().map(|&i| v[i]).collect()),
            Column::Time(v) => Column::Time(rows.iter().map(|&i| v[i]).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_and_null_accounting() {
        let col = Column::Int(vec![Some(10), None, Some(5)]);
        assert_eq!(col.value(0), Value::Int(10));
        assert_eq!(col.value(1), Value::Null);
        assert!(col.is_null(1));
        assert_eq!(col.null_count(), 1);
        assert_eq!(col.len(), 3);
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut col = Column::Str(vec![Some("SP".to_string()), None]);
        col.set(1, &Value::Str("RJ".to_string())).unwrap();
        assert_eq!(col.value(1), Value::Str("RJ".to_string()));
        assert!(col.set(0, &Value::Int(3)).is_err());
        // failed set leaves the cell untouched
        assert_eq!(col.value(0), Value::Str("SP".to_string()));
    }

    #[test]
    fn take_rows_preserves_order() {
        let col = Column::Int(vec![Some(1), Some(2), Some(3)]);
        assert_eq!(col.take_rows(&[2, 0]), Column::Int(vec![Some(3), Some(1)]));
    }
}
