use std::fs::File;
use std::path::Path;
use std::str;

use chrono::{NaiveDate, NaiveTime};
use memchr::{memchr, memchr_iter};
use memmap2::Mmap;
use tracing::info;

use crate::table::column::Column;
use crate::table::schema::{ColumnType, Schema};
use crate::table::table::QueryTable;
use crate::table::ValidationError;

/// Source-format knobs for `load_csv`. Sentinel tokens and empty fields are
/// normalized to null before type coercion, so the validated table never
/// carries a sentinel as data.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub sentinels: Vec<String>,
    /// Parse dates day-first (`%d/%m/%Y`); ISO `%Y-%m-%d` otherwise.
    pub dayfirst: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            delimiter: b';',
            sentinels: Vec::new(),
            dayfirst: true,
        }
    }
}

impl QueryTable {
    /// Load a delimited file against a declared schema using a memory map.
    ///
    /// The header row must name the schema columns in order. Any field that
    /// cannot be coerced to its declared type, or that fails a declared
    /// check, aborts the whole load with the offending column and row.
    pub fn load_csv(
        path: &Path,
        schema: &Schema,
        options: &LoadOptions,
    ) -> Result<QueryTable, ValidationError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let table = parse_buffer(&mmap[..], schema, options)?;
        info!(
            rows = table.row_count(),
            columns = schema.len(),
            path = %path.display(),
            "loaded and validated source file"
        );
        Ok(table)
    }
}

fn parse_buffer(
    buf: &[u8],
    schema: &Schema,
    options: &LoadOptions,
) -> Result<QueryTable, ValidationError> {
    // a header with no trailing newline is still a valid zero-row file
    let (header_line, body_start) = match memchr(b'\n', buf) {
        Some(end) => (trim_cr(&buf[..end]), end + 1),
        None if !buf.is_empty() => (trim_cr(buf), buf.len()),
        None => return Err(ValidationError::MissingHeader),
    };
    let found: Vec<String> = split_fields(header_line, options.delimiter)
        .into_iter()
        .map(|f| String::from_utf8_lossy(f).to_string())
        .collect();
    let expected = schema.names();
    if found != expected {
        return Err(ValidationError::HeaderMismatch { expected, found });
    }

    let mut columns: Vec<Column> = schema
        .columns()
        .iter()
        .map(|spec| Column::new(spec.column_type))
        .collect();

    let sentinels: Vec<&[u8]> = options.sentinels.iter().map(|s| s.as_bytes()).collect();
    let data = &buf[body_start..];
    let mut row_count = 0usize;
    let mut start = 0usize;

    let mut line_ends: Vec<usize> = memchr_iter(b'\n', data).collect();
    if data.last().is_some_and(|&b| b != b'\n') {
        // tolerate a missing trailing newline
        line_ends.push(data.len());
    }

    for (line_idx, line_end) in line_ends.into_iter().enumerate() {
        let line = trim_cr(&data[start..line_end]);
        start = line_end + 1;
        if line.is_empty() {
            continue;
        }
        // physical line number; the header is file row 1
        let file_row = line_idx + 2;
        let fields = split_fields(line, options.delimiter);
        if fields.len() != schema.len() {
            return Err(ValidationError::FieldCount {
                row: file_row,
                expected: schema.len(),
                got: fields.len(),
            });
        }
        for (spec, (column, field)) in schema
            .columns()
            .iter()
            .zip(columns.iter_mut().zip(fields))
        {
            let is_null = field.is_empty() || sentinels.iter().any(|s| *s == field);
            if is_null {
                if !spec.nullable {
                    return Err(ValidationError::NullNotAllowed {
                        column: spec.name.clone(),
                        row: file_row,
                    });
                }
                match spec.column_type {
                    ColumnType::Int => column.push_int(None),
                    ColumnType::Str => column.push_str(None),
                    ColumnType::Date => column.push_date(None),
                    ColumnType::Time => column.push_time(None),
                }
                continue;
            }
            match spec.column_type {
                ColumnType::Int => {
                    let value = atoi_simd::parse::<i64>(field).map_err(|_| coercion(
                        spec.name.as_str(),
                        file_row,
                        field,
                        ColumnType::Int,
                    ))?;
                    column.push_int(Some(value));
                }
                ColumnType::Str => {
                    let value = str::from_utf8(field).map_err(|_| ValidationError::Utf8 {
                        column: spec.name.clone(),
                        row: file_row,
                    })?;
                    if let Some((min, max)) = spec.length {
                        let chars = value.chars().count();
                        if chars < min || chars > max {
                            return Err(ValidationError::Length {
                                column: spec.name.clone(),
                                row: file_row,
                                value: value.to_string(),
                                min,
                                max,
                            });
                        }
                    }
                    column.push_str(Some(value.to_string()));
                }
                ColumnType::Date => {
                    let text = str::from_utf8(field).map_err(|_| ValidationError::Utf8 {
                        column: spec.name.clone(),
                        row: file_row,
                    })?;
                    let value = parse_date(text, options.dayfirst).ok_or_else(|| {
                        coercion(spec.name.as_str(), file_row, field, ColumnType::Date)
                    })?;
                    column.push_date(Some(value));
                }
                ColumnType::Time => {
                    let text = str::from_utf8(field).map_err(|_| ValidationError::Utf8 {
                        column: spec.name.clone(),
                        row: file_row,
                    })?;
                    let value = parse_time(text).ok_or_else(|| {
                        coercion(spec.name.as_str(), file_row, field, ColumnType::Time)
                    })?;
                    column.push_time(Some(value));
                }
            }
        }
        row_count += 1;
    }

    Ok(QueryTable::from_parts(schema.clone(), columns, row_count))
}

fn coercion(column: &str, row: usize, field: &[u8], expected: ColumnType) -> ValidationError {
    ValidationError::Coercion {
        column: column.to_string(),
        row,
        value: String::from_utf8_lossy(field).to_string(),
        expected,
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

fn split_fields(line: &[u8], delimiter: u8) -> Vec<&[u8]> {
    let mut fields = Vec::new();
    let mut field_start = 0;
    for pos in memchr_iter(delimiter, line) {
        fields.push(&line[field_start..pos]);
        field_start = pos + 1;
    }
    fields.push(&line[field_start..]);
    fields
}

fn parse_date(text: &str, dayfirst: bool) -> Option<NaiveDate> {
    let formats: &[&str] = if dayfirst {
        &["%d/%m/%Y", "%d-%m-%Y"]
    } else {
        &["%Y-%m-%d"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

// HH:MM with optional seconds; chrono enforces the 24h ranges.
fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::schema::ColumnSpec;
    use crate::table::Value;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", content).unwrap();
        tmp
    }

    fn small_schema() -> Schema {
        Schema::new(vec![
            ColumnSpec::new("codigo", ColumnType::Int),
            ColumnSpec::new("uf", ColumnType::Str).nullable().with_length(2, 2),
            ColumnSpec::new("dia", ColumnType::Date),
            ColumnSpec::new("hora", ColumnType::Time).nullable(),
        ])
    }

    fn sentinel_options() -> LoadOptions {
        LoadOptions {
            sentinels: vec!["**".to_string(), "NULL".to_string()],
            ..LoadOptions::default()
        }
    }

    #[test]
    fn loads_typed_rows_with_dayfirst_dates() {
        let tmp = write_csv("codigo;uf;dia;hora\n40324;SP;08/12/2015;14:30\n");
        let table = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options()).unwrap();
        assert_eq!(table.row_count(), 1);
        let row = table.row(0).unwrap();
        assert_eq!(row[0], Value::Int(40324));
        assert_eq!(
            row[2],
            Value::Date(NaiveDate::from_ymd_opt(2015, 12, 8).unwrap())
        );
        assert_eq!(
            row[3],
            Value::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap())
        );
    }

    #[test]
    fn sentinels_and_empty_fields_become_null() {
        let tmp = write_csv("codigo;uf;dia;hora\n1;**;01/03/2015;NULL\n2;RJ;02/03/2015;\n");
        let table = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options()).unwrap();
        assert_eq!(table.row(0).unwrap()[1], Value::Null);
        assert_eq!(table.row(0).unwrap()[3], Value::Null);
        assert_eq!(table.row(1).unwrap()[3], Value::Null);
        assert_eq!(table.row(1).unwrap()[1], Value::Str("RJ".to_string()));
    }

    #[test]
    fn invalid_date_aborts_the_load() {
        let tmp = write_csv("codigo;uf;dia;hora\n1;SP;32/13/2015;10:00\n");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "column 'dia', row 2: cannot coerce '32/13/2015' to Date"
        );
    }

    #[test]
    fn invalid_time_pattern_is_a_validation_failure() {
        let tmp = write_csv("codigo;uf;dia;hora\n1;SP;01/03/2015;25:99\n");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        assert!(matches!(err, ValidationError::Coercion { .. }));
    }

    #[test]
    fn length_check_rejects_long_state_codes() {
        let tmp = write_csv("codigo;uf;dia;hora\n1;SAO;01/03/2015;10:00\n");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        assert!(matches!(err, ValidationError::Length { row: 2, .. }));
    }

    #[test]
    fn null_in_required_column_is_fatal() {
        let tmp = write_csv("codigo;uf;dia;hora\n1;SP;;10:00\n");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        assert!(matches!(err, ValidationError::NullNotAllowed { row: 2, .. }));
    }

    #[test]
    fn header_mismatch_is_fatal() {
        let tmp = write_csv("wrong;uf;dia;hora\n1;SP;01/03/2015;10:00\n");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        assert!(matches!(err, ValidationError::HeaderMismatch { .. }));
    }

    #[test]
    fn header_only_file_is_a_valid_empty_table() {
        let tmp = write_csv("codigo;uf;dia;hora");
        let table = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options()).unwrap();
        assert_eq!(table.row_count(), 0);

        let tmp = write_csv("");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingHeader));
    }

    #[test]
    fn error_rows_count_physical_lines_past_blanks() {
        let tmp = write_csv("codigo;uf;dia;hora\n\n1;SP;32/13/2015;10:00\n");
        let err = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options())
            .unwrap_err();
        // the bad record sits on file line 3, after a blank line
        assert!(matches!(err, ValidationError::Coercion { row: 3, .. }));
    }

    #[test]
    fn tolerates_missing_trailing_newline_and_crlf() {
        let tmp = write_csv("codigo;uf;dia;hora\r\n1;SP;01/03/2015;10:00\r\n2;RJ;02/03/2015;11:00");
        let table = QueryTable::load_csv(tmp.path(), &small_schema(), &sentinel_options()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.row(1).unwrap()[1], Value::Str("RJ".to_string()));
    }
}
