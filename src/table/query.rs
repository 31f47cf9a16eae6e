use std::cell::RefCell;
use std::fmt;
use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use tracing::trace;

use crate::table::predicate::Predicate;
use crate::table::table::{GroupedAggregate, QueryTable};
use crate::table::{AggregateOp, QueryError, Value};

/// Fingerprint of a fully composed query, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    filters: Vec<Predicate>,
    group_by: Vec<String>,
    aggregations: Vec<(String, AggregateOp, Option<String>)>,
    select: Vec<String>,
    sort: Option<(String, bool)>,
    sort_values: Option<bool>,
    limit: Option<usize>,
    keep_null_groups: bool,
}

/// LRU cache for repeated exploratory queries. Shared across builders via
/// `Rc`; clear it after any `mutate` on the underlying table.
#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<QueryKey, QueryResult>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(128)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        QueryCache {
            cache: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryResult> {
        self.cache.borrow_mut().get(key).cloned()
    }

    pub fn put(&self, key: QueryKey, value: QueryResult) {
        self.cache.borrow_mut().put(key, value);
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// What a query hands to the Reporter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Projected records, table order preserved
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Single aggregation
    Aggregate(Value),
    /// Multiple aggregations by measure name
    MultiAggregate(Vec<(String, Value)>),
    /// Grouping with one measure
    Grouped(GroupedAggregate),
    /// Grouping with several measures per key tuple
    GroupedMulti {
        keys: Vec<String>,
        measures: Vec<String>,
        data: Vec<(Vec<Value>, Vec<Value>)>,
    },
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows { columns, rows } => {
                writeln!(f, "{}", columns.join(","))?;
                for row in rows {
                    let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                    writeln!(f, "{}", fields.join(","))?;
                }
                Ok(())
            }
            QueryResult::Aggregate(value) => writeln!(f, "{}", value),
            QueryResult::MultiAggregate(entries) => {
                for (name, value) in entries {
                    writeln!(f, "{}: {}", name, value)?;
                }
                Ok(())
            }
            QueryResult::Grouped(grouped) => write!(f, "{}", grouped),
            QueryResult::GroupedMulti { measures, data, .. } => {
                for (key, values) in data {
                    let keys: Vec<String> = key.iter().map(|k| k.to_string()).collect();
                    let cells: Vec<String> = measures
                        .iter()
                        .zip(values)
                        .map(|(m, v)| format!("{}={}", m, v))
                        .collect();
                    writeln!(f, "{}: {}", keys.join(","), cells.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

/// Fluent query composition over a shared table.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: Rc<QueryTable>,
    cache: Option<Rc<QueryCache>>,
    filters: Vec<Predicate>,
    group_by: Vec<String>,
    aggregations: Vec<(String, AggregateOp, Option<String>)>,
    select: Vec<String>,
    sort: Option<(String, bool)>,
    sort_values: Option<bool>,
    limit: Option<usize>,
    keep_null_groups: bool,
}

impl QueryBuilder {
    pub fn new(table: Rc<QueryTable>, cache: Option<Rc<QueryCache>>) -> Self {
        QueryBuilder {
            table,
            cache,
            filters: Vec::new(),
            group_by: Vec::new(),
            aggregations: Vec::new(),
            select: Vec::new(),
            sort: None,
            sort_values: None,
            limit: None,
            keep_null_groups: true,
        }
    }

    /// Add a filter; several filters compose as a conjunction.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn group_by(mut self, column: &str) -> Self {
        self.group_by.push(column.to_string());
        self
    }

    pub fn group_by_multi(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self.group_by.push(column.to_string());
        }
        self
    }

    /// Exclude groups whose key tuple contains a null.
    pub fn drop_null_groups(mut self) -> Self {
        self.keep_null_groups = false;
        self
    }

    pub fn aggregate(mut self, column: &str, op: AggregateOp) -> Self {
        self.aggregations.push((column.to_string(), op, None));
        self
    }

    pub fn aggregate_as(mut self, column: &str, op: AggregateOp, alias: &str) -> Self {
        self.aggregations
            .push((column.to_string(), op, Some(alias.to_string())));
        self
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.select = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Sort projected rows by a column (stable).
    pub fn sort_by(mut self, column: &str, ascending: bool) -> Self {
        self.sort = Some((column.to_string(), ascending));
        self
    }

    /// Sort grouped aggregates by their measure (stable).
    pub fn sort_values(mut self, ascending: bool) -> Self {
        self.sort_values = Some(ascending);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Execute the composed query. The shape — how many group-by columns,
    /// aggregations and selected columns — decides the result variant.
    pub fn execute(self) -> Result<QueryResult, QueryError> {
        let key = self.fingerprint();
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                trace!("query cache hit");
                return Ok(hit);
            }
        }

        let filtered = self.apply_filters()?;
        let result = match (
            self.group_by.len(),
            self.aggregations.len(),
            self.select.len(),
        ) {
            (0, 0, _) => self.execute_rows(filtered)?,
            (0, 1, 0) => {
                let rows = self.rows_or_all(filtered);
                let (column, op, _) = &self.aggregations[0];
                QueryResult::Aggregate(self.table.aggregate(&rows, *op, column)?)
            }
            (0, _, 0) => {
                let rows = self.rows_or_all(filtered);
                let mut entries = Vec::with_capacity(self.aggregations.len());
                for (column, op, alias) in &self.aggregations {
                    let value = self.table.aggregate(&rows, *op, column)?;
                    entries.push((measure_name(column, *op, alias.as_deref()), value));
                }
                QueryResult::MultiAggregate(entries)
            }
            (_, 0, 0) => {
                let rows = self.rows_or_all(filtered);
                let keys: Vec<&str> = self.group_by.iter().map(|k| k.as_str()).collect();
                let grouped =
                    self.table
                        .group_by_rows(&rows, &keys, self.keep_null_groups)?;
                let mut sizes = grouped.sizes();
                if let Some(ascending) = self.sort_values {
                    sizes = sizes.sorted_by_value(ascending);
                }
                QueryResult::Grouped(sizes)
            }
            (_, 1, 0) => {
                let rows = self.rows_or_all(filtered);
                let keys: Vec<&str> = self.group_by.iter().map(|k| k.as_str()).collect();
                let grouped =
                    self.table
                        .group_by_rows(&rows, &keys, self.keep_null_groups)?;
                let (column, op, _) = &self.aggregations[0];
                let mut aggregated = grouped.aggregate(*op, column)?;
                if let Some(ascending) = self.sort_values {
                    aggregated = aggregated.sorted_by_value(ascending);
                }
                QueryResult::Grouped(aggregated)
            }
            (_, _, 0) => {
                let rows = self.rows_or_all(filtered);
                let keys: Vec<&str> = self.group_by.iter().map(|k| k.as_str()).collect();
                let grouped =
                    self.table
                        .group_by_rows(&rows, &keys, self.keep_null_groups)?;
                let measures: Vec<String> = self
                    .aggregations
                    .iter()
                    .map(|(column, op, alias)| measure_name(column, *op, alias.as_deref()))
                    .collect();
                let mut data = Vec::with_capacity(grouped.len());
                for (key, group_rows) in grouped.groups() {
                    let mut values = Vec::with_capacity(self.aggregations.len());
                    for (column, op, _) in &self.aggregations {
                        values.push(self.table.aggregate(group_rows, *op, column)?);
                    }
                    data.push((key.clone(), values));
                }
                QueryResult::GroupedMulti {
                    keys: self.group_by.clone(),
                    measures,
                    data,
                }
            }
            _ => {
                return Err(QueryError::InvalidQuery(
                    "column selection cannot be combined with group_by/aggregate".to_string(),
                ))
            }
        };

        if let Some(cache) = &self.cache {
            cache.put(key, result.clone());
        }
        Ok(result)
    }

    fn fingerprint(&self) -> QueryKey {
        QueryKey {
            filters: self.filters.clone(),
            group_by: self.group_by.clone(),
            aggregations: self.aggregations.clone(),
            select: self.select.clone(),
            sort: self.sort.clone(),
            sort_values: self.sort_values,
            limit: self.limit,
            keep_null_groups: self.keep_null_groups,
        }
    }

    /// Evaluate each filter and intersect the matching row ids; `None`
    /// means "no filters", i.e. every row.
    fn apply_filters(&self) -> Result<Option<Vec<usize>>, QueryError> {
        let mut filtered: Option<Vec<usize>> = None;
        for predicate in &self.filters {
            let current = self.table.select(predicate)?;
            filtered = Some(match filtered {
                None => current,
                Some(existing) => intersect_sorted(existing, current),
            });
        }
        Ok(filtered)
    }

    fn rows_or_all(&self, filtered: Option<Vec<usize>>) -> Vec<usize> {
        filtered.unwrap_or_else(|| (0..self.table.row_count()).collect())
    }

    fn execute_rows(&self, filtered: Option<Vec<usize>>) -> Result<QueryResult, QueryError> {
        let mut rows = self.rows_or_all(filtered);
        if let Some((column, ascending)) = &self.sort {
            rows = self.table.sort_by(rows, column, *ascending)?;
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        let columns: Vec<String> = if self.select.is_empty() {
            self.table.headers()
        } else {
            self.select.clone()
        };
        let names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
        let projected = self.table.project(&names, Some(&rows))?;
        Ok(QueryResult::Rows {
            columns,
            rows: projected,
        })
    }
}

fn measure_name(column: &str, op: AggregateOp, alias: Option<&str>) -> String {
    match alias {
        Some(alias) => alias.to_string(),
        None => format!("{}_{:?}", column, op).to_lowercase(),
    }
}

// Both inputs come out of `select`, already in ascending table order.
fn intersect_sorted(a: Vec<usize>, b: Vec<usize>) -> Vec<usize> {
    let mut result = Vec::new();
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                result.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    result
}

impl QueryTable {
    pub fn query(self: &Rc<Self>) -> QueryBuilder {
        QueryBuilder::new(Rc::clone(self), None)
    }

    pub fn query_with_cache(self: &Rc<Self>, cache: &Rc<QueryCache>) -> QueryBuilder {
        QueryBuilder::new(Rc::clone(self), Some(Rc::clone(cache)))
    }
}
