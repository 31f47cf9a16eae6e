//! CENIPA occurrence dataset bindings: the declared schema for
//! `ocorrencia.csv`, the "not informed" sentinel tokens, and a loader entry
//! point wired for the `;`-delimited, day-first source format.

use std::path::Path;

use crate::table::loader::LoadOptions;
use crate::table::schema::{ColumnSpec, ColumnType, Schema};
use crate::table::table::QueryTable;
use crate::table::ValidationError;

/// Raw tokens that mean "value not informed" in the source file. They are
/// normalized to null at load; they never survive as data.
pub const SENTINELS: [&str; 6] = ["**", "###!", "####", "****", "*****", "NULL"];

/// Column declarations for one occurrence record, in file-header order.
pub fn occurrence_schema() -> Schema {
    Schema::new(vec![
        ColumnSpec::new("codigo_ocorrencia", ColumnType::Int),
        ColumnSpec::new("codigo_ocorrencia2", ColumnType::Int),
        ColumnSpec::new("ocorrencia_classificacao", ColumnType::Str),
        ColumnSpec::new("ocorrencia_cidade", ColumnType::Str),
        ColumnSpec::new("ocorrencia_uf", ColumnType::Str)
            .nullable()
            .with_length(2, 2),
        ColumnSpec::new("ocorrencia_aerodromo", ColumnType::Str).nullable(),
        ColumnSpec::new("ocorrencia_dia", ColumnType::Date),
        ColumnSpec::new("ocorrencia_hora", ColumnType::Time).nullable(),
        ColumnSpec::new("total_recomendacoes", ColumnType::Int),
    ])
}

pub fn load_options() -> LoadOptions {
    LoadOptions {
        delimiter: b';',
        sentinels: SENTINELS.iter().map(|s| s.to_string()).collect(),
        dayfirst: true,
    }
}

/// Load and validate a CENIPA occurrence file.
pub fn load_occurrences(path: &Path) -> Result<QueryTable, ValidationError> {
    QueryTable::load_csv(path, &occurrence_schema(), &load_options())
}
