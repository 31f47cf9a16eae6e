use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::table::column::Column;
use crate::table::predicate::Predicate;
use crate::table::schema::{ColumnType, Schema};
use crate::table::{AggregateOp, QueryError, Value};

/// How a record is addressed: by its load-order position, or by a
/// designated key column. Switching modes is explicit and reversible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMode {
    Ordinal,
    Key(String),
}

/// In-memory, schema-typed table of validated records, preserving load
/// order. All operations are pure reads except `mutate`/`mutate_where`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    schema: Schema,
    columns: Vec<Column>,
    row_count: usize,
    index: IndexMode,
}

impl QueryTable {
    pub(crate) fn from_parts(schema: Schema, columns: Vec<Column>, row_count: usize) -> Self {
        QueryTable {
            schema,
            columns,
            row_count,
            index: IndexMode::Ordinal,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn headers(&self) -> Vec<String> {
        self.schema.names()
    }

    pub fn column(&self, name: &str) -> Result<&Column, QueryError> {
        let pos = self.schema.position(name)?;
        Ok(&self.columns[pos])
    }

    /// Ordered row ids of the records matching `predicate`. The predicate
    /// is validated against the schema before any row is touched.
    pub fn select(&self, predicate: &Predicate) -> Result<Vec<usize>, QueryError> {
        predicate.validate(self)?;
        Ok((0..self.row_count)
            .filter(|&row| predicate.matches(self, row))
            .collect())
    }

    /// Project `columns` for the given rows (all rows when `None`),
    /// preserving order.
    pub fn project(
        &self,
        columns: &[&str],
        rows: Option<&[usize]>,
    ) -> Result<Vec<Vec<Value>>, QueryError> {
        let mut positions = Vec::with_capacity(columns.len());
        for name in columns {
            positions.push(self.schema.position(name)?);
        }
        let project_one = |row: usize| {
            positions
                .iter()
                .map(|&p| self.columns[p].value(row))
                .collect::<Vec<Value>>()
        };
        match rows {
            Some(ids) => {
                for &id in ids {
                    if id >= self.row_count {
                        return Err(QueryError::RowOutOfBounds(id));
                    }
                }
                Ok(ids.iter().map(|&id| project_one(id)).collect())
            }
            None => Ok((0..self.row_count).map(project_one).collect()),
        }
    }

    pub fn row(&self, idx: usize) -> Result<Vec<Value>, QueryError> {
        if idx >= self.row_count {
            return Err(QueryError::RowOutOfBounds(idx));
        }
        Ok(self.columns.iter().map(|c| c.value(idx)).collect())
    }

    pub fn rows_at(&self, ids: &[usize]) -> Result<Vec<Vec<Value>>, QueryError> {
        ids.iter().map(|&id| self.row(id)).collect()
    }

    /// Designate `column` as the key for `row_by_key` lookups.
    pub fn set_index(&mut self, column: &str) -> Result<(), QueryError> {
        self.schema.position(column)?;
        self.index = IndexMode::Key(column.to_string());
        Ok(())
    }

    /// Revert to ordinal addressing.
    pub fn reset_index(&mut self) {
        self.index = IndexMode::Ordinal;
    }

    pub fn index_mode(&self) -> &IndexMode {
        &self.index
    }

    /// Look a record up through the current index mode. Under ordinal mode
    /// the key is an `Int` position; under key mode it is compared against
    /// the designated column, first match in table order wins.
    pub fn row_by_key(&self, key: &Value) -> Result<Vec<Value>, QueryError> {
        match &self.index {
            IndexMode::Ordinal => match key {
                Value::Int(pos) if *pos >= 0 => self.row(*pos as usize),
                _ => Err(QueryError::KeyNotFound(key.clone())),
            },
            IndexMode::Key(column) => {
                let col = self.column(column)?;
                for row in 0..self.row_count {
                    if !col.is_null(row) && col.value(row) == *key {
                        return self.row(row);
                    }
                }
                Err(QueryError::KeyNotFound(key.clone()))
            }
        }
    }

    /// Whether every value in `column` is distinct (nulls compare equal to
    /// each other).
    pub fn is_unique(&self, column: &str) -> Result<bool, QueryError> {
        let col = self.column(column)?;
        let mut seen: HashSet<Value> = HashSet::with_capacity(self.row_count);
        for row in 0..self.row_count {
            if !seen.insert(col.value(row)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Per-column null counts, in schema order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.schema
            .columns()
            .iter()
            .zip(&self.columns)
            .map(|(spec, col)| (spec.name.clone(), col.null_count()))
            .collect()
    }

    /// Partition all records by equality of the key tuple. Null is a
    /// distinct, valid key unless `keep_null_groups` is false.
    pub fn group_by(&self, keys: &[&str], keep_null_groups: bool) -> Result<Grouped<'_>, QueryError> {
        let all: Vec<usize> = (0..self.row_count).collect();
        self.group_by_rows(&all, keys, keep_null_groups)
    }

    /// Same as `group_by`, restricted to the given rows.
    pub fn group_by_rows(
        &self,
        rows: &[usize],
        keys: &[&str],
        keep_null_groups: bool,
    ) -> Result<Grouped<'_>, QueryError> {
        let mut positions = Vec::with_capacity(keys.len());
        for name in keys {
            positions.push(self.schema.position(name)?);
        }
        let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
        let mut by_key: HashMap<Vec<Value>, usize> = HashMap::new();
        for &row in rows {
            if row >= self.row_count {
                return Err(QueryError::RowOutOfBounds(row));
            }
            let key: Vec<Value> = positions.iter().map(|&p| self.columns[p].value(row)).collect();
            if !keep_null_groups && key.iter().any(Value::is_null) {
                continue;
            }
            match by_key.get(&key) {
                Some(&slot) => groups[slot].1.push(row),
                None => {
                    by_key.insert(key.clone(), groups.len());
                    groups.push((key, vec![row]));
                }
            }
        }
        Ok(Grouped {
            table: self,
            keys: keys.iter().map(|k| k.to_string()).collect(),
            groups,
        })
    }

    /// Aggregate `column` over the given rows. Counts on empty input are
    /// `Int(0)`; a sum with no non-null values is `Null`, never zero.
    pub fn aggregate(
        &self,
        rows: &[usize],
        op: AggregateOp,
        column: &str,
    ) -> Result<Value, QueryError> {
        let col = self.column(column)?;
        for &row in rows {
            if row >= self.row_count {
                return Err(QueryError::RowOutOfBounds(row));
            }
        }
        match op {
            AggregateOp::CountRows => Ok(Value::Int(rows.len() as i64)),
            AggregateOp::CountValues => Ok(Value::Int(
                rows.iter().filter(|&&row| !col.is_null(row)).count() as i64,
            )),
            AggregateOp::Sum => match col {
                Column::Int(values) => {
                    let mut sum: i64 = 0;
                    let mut any = false;
                    for &row in rows {
                        if let Some(v) = values[row] {
                            sum += v;
                            any = true;
                        }
                    }
                    Ok(if any { Value::Int(sum) } else { Value::Null })
                }
                _ => Err(QueryError::NonNumericSum(column.to_string())),
            },
        }
    }

    /// Stable sort of `rows` by `column`; ties keep their input order.
    /// Nulls sort first ascending (last descending).
    pub fn sort_by(
        &self,
        mut rows: Vec<usize>,
        column: &str,
        ascending: bool,
    ) -> Result<Vec<usize>, QueryError> {
        let col = self.column(column)?;
        for &row in &rows {
            if row >= self.row_count {
                return Err(QueryError::RowOutOfBounds(row));
            }
        }
        rows.sort_by(|&a, &b| {
            let ord = col.value(a).cmp(&col.value(b));
            if ascending { ord } else { ord.reverse() }
        });
        Ok(rows)
    }

    /// Bulk-assign `value` to `column` for the given rows. The only
    /// operation that alters table state; validated up front so a failed
    /// call leaves the table unchanged. Returns the number of rows written.
    pub fn mutate(
        &mut self,
        rows: &[usize],
        column: &str,
        value: &Value,
    ) -> Result<usize, QueryError> {
        let pos = self.schema.position(column)?;
        let spec = self.schema.spec(column)?;
        match value {
            Value::Null if !spec.nullable => {
                return Err(QueryError::NullNotAllowed(column.to_string()));
            }
            Value::Null => {}
            other => {
                let expected = self.columns[pos].column_type();
                let actual = match other {
                    Value::Int(_) => ColumnType::Int,
                    Value::Str(_) => ColumnType::Str,
                    Value::Date(_) => ColumnType::Date,
                    Value::Time(_) => ColumnType::Time,
                    Value::Null => unreachable!(),
                };
                if actual != expected {
                    return Err(QueryError::TypeMismatch {
                        column: column.to_string(),
                        expected,
                        actual,
                    });
                }
            }
        }
        // assigned strings are held to the same length check the loader applies
        if let (Value::Str(s), Some((min, max))) = (value, spec.length) {
            let chars = s.chars().count();
            if chars < min || chars > max {
                return Err(QueryError::LengthOutOfRange {
                    column: column.to_string(),
                    value: s.clone(),
                    min,
                    max,
                });
            }
        }
        for &row in rows {
            if row >= self.row_count {
                return Err(QueryError::RowOutOfBounds(row));
            }
        }
        let col = &mut self.columns[pos];
        for &row in rows {
            col.set(row, value)?;
        }
        debug!(column, rows = rows.len(), "mutated column values");
        Ok(rows.len())
    }

    /// `mutate` over the rows matching `predicate`.
    pub fn mutate_where(
        &mut self,
        predicate: &Predicate,
        column: &str,
        value: &Value,
    ) -> Result<usize, QueryError> {
        let rows = self.select(predicate)?;
        self.mutate(&rows, column, value)
    }

    /// New table keeping only rows with no nulls in `subset` (or in any
    /// column when `None`). The receiver is untouched.
    pub fn drop_null_rows(&self, subset: Option<&[&str]>) -> Result<QueryTable, QueryError> {
        let positions: Vec<usize> = match subset {
            Some(names) => {
                let mut out = Vec::with_capacity(names.len());
                for name in names {
                    out.push(self.schema.position(name)?);
                }
                out
            }
            None => (0..self.columns.len()).collect(),
        };
        let keep: Vec<usize> = (0..self.row_count)
            .filter(|&row| positions.iter().all(|&p| !self.columns[p].is_null(row)))
            .collect();
        Ok(self.take_rows(&keep))
    }

    /// New table with exact duplicate rows removed, first occurrence kept.
    pub fn drop_duplicates(&self) -> QueryTable {
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(self.row_count);
        let mut keep = Vec::with_capacity(self.row_count);
        for row in 0..self.row_count {
            let values: Vec<Value> = self.columns.iter().map(|c| c.value(row)).collect();
            if seen.insert(values) {
                keep.push(row);
            }
        }
        self.take_rows(&keep)
    }

    /// Snapshot containing only the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> QueryTable {
        QueryTable {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|c| c.take_rows(rows)).collect(),
            row_count: rows.len(),
            index: self.index.clone(),
        }
    }
}

/// Result of `group_by`: key tuples mapped to the rows that carry them,
/// ordered by first appearance.
#[derive(Debug)]
pub struct Grouped<'a> {
    table: &'a QueryTable,
    keys: Vec<String>,
    groups: Vec<(Vec<Value>, Vec<usize>)>,
}

impl Grouped<'_> {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn groups(&self) -> &[(Vec<Value>, Vec<usize>)] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, key: &[Value]) -> Option<&[usize]> {
        self.groups
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, rows)| rows.as_slice())
    }

    /// Record count per group, nulls included.
    pub fn sizes(&self) -> GroupedAggregate {
        GroupedAggregate {
            keys: self.keys.clone(),
            entries: self
                .groups
                .iter()
                .map(|(k, rows)| (k.clone(), Value::Int(rows.len() as i64)))
                .collect(),
        }
    }

    /// Aggregate `column` within each group.
    pub fn aggregate(&self, op: AggregateOp, column: &str) -> Result<GroupedAggregate, QueryError> {
        let mut entries = Vec::with_capacity(self.groups.len());
        for (key, rows) in &self.groups {
            entries.push((key.clone(), self.table.aggregate(rows, op, column)?));
        }
        Ok(GroupedAggregate {
            keys: self.keys.clone(),
            entries,
        })
    }
}

/// Key tuple to scalar mapping handed to the Reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAggregate {
    keys: Vec<String>,
    entries: Vec<(Vec<Value>, Value)>,
}

impl GroupedAggregate {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn entries(&self) -> &[(Vec<Value>, Value)] {
        &self.entries
    }

    pub fn get(&self, key: &[Value]) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, v)| v)
    }

    /// Stable sort by aggregate value; ties keep first-appearance order.
    pub fn sorted_by_value(mut self, ascending: bool) -> Self {
        self.entries.sort_by(|(_, a), (_, b)| {
            let ord = a.cmp(b);
            if ascending { ord } else { ord.reverse() }
        });
        self
    }
}

// Key tuples render comma-joined, one group per line.
impl fmt::Display for GroupedAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            let formatted: Vec<String> = key.iter().map(|k| k.to_string()).collect();
            writeln!(f, "{}: {}", formatted.join(","), value)?;
        }
        Ok(())
    }
}
