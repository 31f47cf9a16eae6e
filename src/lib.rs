//! # query-table
//!
//! `query-table` is an in-memory, schema-typed tabular query engine for
//! CENIPA aviation-occurrence CSV files. It supports:
//!
//! - Memory-mapped, `;`-delimited loading against a declared column schema
//! - Fatal validation (type coercion, length and time-pattern checks)
//! - Sentinel-token ("not informed") normalization to first-class nulls
//! - Composable predicate filtering with null-propagating comparisons
//! - Grouping with null-aware aggregation (count rows, count values, sum)
//! - Stable sorting, projection, and a single explicit bulk `mutate`
//! - An LRU query cache for repeated exploratory queries
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::rc::Rc;
//! use query_table::cenipa;
//! use query_table::table::predicate::Predicate;
//! use query_table::table::{AggregateOp, Value};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = Rc::new(cenipa::load_occurrences(Path::new("ocorrencia.csv"))?);
//!
//!     // Serious incidents in Sao Paulo
//!     let result = table
//!         .query()
//!         .filter(Predicate::eq(
//!             "ocorrencia_classificacao",
//!             Value::Str("INCIDENTE GRAVE".to_string()),
//!         ))
//!         .filter(Predicate::eq("ocorrencia_uf", Value::Str("SP".to_string())))
//!         .select(&["ocorrencia_cidade", "ocorrencia_dia"])
//!         .execute()?;
//!     println!("{}", result);
//!
//!     // Recommendation totals per city
//!     let totals = table
//!         .query()
//!         .group_by("ocorrencia_cidade")
//!         .aggregate("total_recomendacoes", AggregateOp::Sum)
//!         .execute()?;
//!     println!("{}", totals);
//!     Ok(())
//! }
//! ```

pub mod cenipa;
pub mod table;
