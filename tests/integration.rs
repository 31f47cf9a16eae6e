use std::io::Write;
use std::rc::Rc;

use chrono::NaiveDate;
use query_table::cenipa;
use query_table::table::predicate::Predicate;
use query_table::table::query::{QueryCache, QueryResult};
use query_table::table::table::QueryTable;
use query_table::table::{AggregateOp, Value, ValidationError};
use tempfile::NamedTempFile;

const HEADER: &str = "codigo_ocorrencia;codigo_ocorrencia2;ocorrencia_classificacao;ocorrencia_cidade;ocorrencia_uf;ocorrencia_aerodromo;ocorrencia_dia;ocorrencia_hora;total_recomendacoes";

fn write_occurrences(rows: &[&str]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    writeln!(tmp, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(tmp, "{}", row).unwrap();
    }
    tmp
}

fn sample_table() -> QueryTable {
    let tmp = write_occurrences(&[
        "1;1;INCIDENTE;CURITIBA;PR;SBBI;01/03/2015;10:00;10",
        "2;2;INCIDENTE GRAVE;MACEIO;AL;****;15/03/2015;NULL;0",
        "3;3;INCIDENTE;MANAUS;**;SBEG;08/12/2015;23:15:00;5",
        "4;4;ACIDENTE;SAO PAULO;SP;SBSP;10/06/2010;09:00;3",
        "5;5;INCIDENTE GRAVE;RIO DE JANEIRO;RJ;SBRJ;20/06/2010;14:00;7",
    ]);
    cenipa::load_occurrences(tmp.path()).unwrap()
}

#[test]
fn sentinels_become_nulls_in_exactly_the_right_cells() {
    let table = sample_table();
    let null_uf = table.select(&Predicate::is_null("ocorrencia_uf")).unwrap();
    assert_eq!(null_uf, vec![2]);
    let null_aero = table
        .select(&Predicate::is_null("ocorrencia_aerodromo"))
        .unwrap();
    assert_eq!(null_aero, vec![1]);
    let null_hora = table
        .select(&Predicate::is_null("ocorrencia_hora"))
        .unwrap();
    assert_eq!(null_hora, vec![1]);
}

#[test]
fn and_is_intersection_or_is_union_in_table_order() {
    let table = sample_table();
    let p = Predicate::eq(
        "ocorrencia_classificacao",
        Value::Str("INCIDENTE GRAVE".to_string()),
    );
    let q = Predicate::year("ocorrencia_dia", 2010);

    let p_rows = table.select(&p).unwrap();
    let q_rows = table.select(&q).unwrap();
    let both = table.select(&p.clone().and(q.clone())).unwrap();
    let either = table.select(&p.or(q)).unwrap();

    assert_eq!(p_rows, vec![1, 4]);
    assert_eq!(q_rows, vec![3, 4]);
    assert_eq!(both, vec![4]);
    assert_eq!(either, vec![1, 3, 4]);
}

#[test]
fn substring_filters_are_case_sensitive_and_ordered() {
    let table = sample_table();
    let c_rows = table
        .select(&Predicate::starts_with("ocorrencia_cidade", "C"))
        .unwrap();
    let c_cities = table.project(&["ocorrencia_cidade"], Some(&c_rows)).unwrap();
    assert_eq!(c_cities, vec![vec![Value::Str("CURITIBA".to_string())]]);

    let ma_rows = table
        .select(&Predicate::contains("ocorrencia_cidade", "MA"))
        .unwrap();
    let names = table.project(&["ocorrencia_cidade"], Some(&ma_rows)).unwrap();
    assert_eq!(
        names,
        vec![
            vec![Value::Str("MACEIO".to_string())],
            vec![Value::Str("MANAUS".to_string())],
        ]
    );
}

#[test]
fn null_key_groups_are_opt_in() {
    let table = sample_table();
    let with_null = table.group_by(&["ocorrencia_uf"], true).unwrap().sizes();
    assert_eq!(
        with_null.get(&[Value::Str("PR".to_string())]),
        Some(&Value::Int(1))
    );
    assert_eq!(with_null.get(&[Value::Null]), Some(&Value::Int(1)));
    assert_eq!(with_null.entries().len(), 5);

    let without_null = table.group_by(&["ocorrencia_uf"], false).unwrap().sizes();
    assert_eq!(without_null.entries().len(), 4);
    assert_eq!(without_null.get(&[Value::Null]), None);
}

#[test]
fn count_values_is_smaller_than_count_rows_when_nulls_are_present() {
    let table = sample_table();
    let grouped = table.group_by(&["ocorrencia_classificacao"], true).unwrap();
    let key = [Value::Str("INCIDENTE GRAVE".to_string())];
    let rows = grouped.get(&key).unwrap().to_vec();
    let all = table
        .aggregate(&rows, AggregateOp::CountRows, "ocorrencia_aerodromo")
        .unwrap();
    let informed = table
        .aggregate(&rows, AggregateOp::CountValues, "ocorrencia_aerodromo")
        .unwrap();
    assert_eq!(all, Value::Int(2));
    assert_eq!(informed, Value::Int(1));
}

#[test]
fn sum_skips_nulls_and_an_empty_sum_has_no_value() {
    let table = sample_table();
    let sum = table
        .aggregate(&[0, 2], AggregateOp::Sum, "total_recomendacoes")
        .unwrap();
    assert_eq!(sum, Value::Int(15));
    let empty = table
        .aggregate(&[], AggregateOp::Sum, "total_recomendacoes")
        .unwrap();
    assert_eq!(empty, Value::Null);
}

#[test]
fn validation_failure_aborts_the_whole_load() {
    let tmp = write_occurrences(&[
        "1;1;INCIDENTE;CURITIBA;PR;SBBI;01/03/2015;10:00;10",
        "2;2;INCIDENTE;MACEIO;ALAGOAS;SBMO;02/03/2015;10:00;0",
    ]);
    let err = cenipa::load_occurrences(tmp.path()).unwrap_err();
    assert!(matches!(err, ValidationError::Length { row: 3, .. }));
}

#[test]
fn date_component_filters_follow_the_calendar() {
    let table = sample_table();
    let december = table
        .select(
            &Predicate::year("ocorrencia_dia", 2015)
                .and(Predicate::month("ocorrencia_dia", 12)),
        )
        .unwrap();
    assert_eq!(december, vec![2]);
    let row = table.row(december[0]).unwrap();
    assert_eq!(
        row[6],
        Value::Date(NaiveDate::from_ymd_opt(2015, 12, 8).unwrap())
    );

    let early_march = table
        .select(
            &Predicate::year("ocorrencia_dia", 2015)
                .and(Predicate::month("ocorrencia_dia", 3))
                .and(Predicate::day_between("ocorrencia_dia", 1, 8)),
        )
        .unwrap();
    assert_eq!(early_march, vec![0]);
}

#[test]
fn full_session_through_the_builder() {
    let table = Rc::new(sample_table());
    let cache = Rc::new(QueryCache::new());

    let southeast = Predicate::is_in(
        "ocorrencia_uf",
        vec![
            Value::Str("SP".to_string()),
            Value::Str("MG".to_string()),
            Value::Str("ES".to_string()),
            Value::Str("RJ".to_string()),
        ],
    );
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::year("ocorrencia_dia", 2010))
        .filter(southeast)
        .group_by("ocorrencia_cidade")
        .aggregate("total_recomendacoes", AggregateOp::Sum)
        .sort_values(false)
        .execute()
        .unwrap();
    match result {
        QueryResult::Grouped(grouped) => {
            let entries = grouped.entries();
            assert_eq!(entries.len(), 2);
            assert_eq!(
                entries[0],
                (
                    vec![Value::Str("RIO DE JANEIRO".to_string())],
                    Value::Int(7)
                )
            );
            assert_eq!(
                entries[1],
                (vec![Value::Str("SAO PAULO".to_string())], Value::Int(3))
            );
        }
        other => panic!("expected grouped result, got {:?}", other),
    }
}

#[test]
fn query_errors_leave_the_table_usable() {
    let table = sample_table();
    assert!(table
        .select(&Predicate::eq("no_such_column", Value::Int(1)))
        .is_err());
    assert!(table
        .aggregate(&[0], AggregateOp::Sum, "ocorrencia_cidade")
        .is_err());
    assert_eq!(table.row_count(), 5);
    assert_eq!(
        table
            .select(&Predicate::is_not_null("ocorrencia_uf"))
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn conditional_bulk_assignment() {
    let tmp = write_occurrences(&[
        "1;1;INCIDENTE;SAO PAULO;SP;SBSP;01/03/2015;10:00;0",
        "2;2;INCIDENTE;CURITIBA;PR;SBBI;02/03/2015;10:00;0",
    ]);
    let mut table = cenipa::load_occurrences(tmp.path()).unwrap();
    let changed = table
        .mutate_where(
            &Predicate::eq("ocorrencia_uf", Value::Str("SP".to_string())),
            "ocorrencia_classificacao",
            &Value::Str("GRAVE".to_string()),
        )
        .unwrap();
    assert_eq!(changed, 1);
    assert_eq!(table.row(0).unwrap()[2], Value::Str("GRAVE".to_string()));
    assert_eq!(
        table.row(1).unwrap()[2],
        Value::Str("INCIDENTE".to_string())
    );
}
