use std::path::PathBuf;
use std::rc::Rc;

use jemallocator::Jemalloc;
use query_table::cenipa;
use query_table::table::predicate::Predicate;
use query_table::table::query::QueryCache;
use query_table::table::{AggregateOp, Value};

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Replays the CENIPA exploration session against a real occurrence file:
/// load + validate, null accounting, ad-hoc filters, groupings and sorted
/// aggregates, printed as they come.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path: PathBuf = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ocorrencia.csv".to_string())
        .into();

    let mut table = cenipa::load_occurrences(&path)?;
    println!("{} occurrences loaded from {}", table.row_count(), path.display());

    println!("\nnot-informed values per column:");
    for (column, nulls) in table.null_counts() {
        println!("  {}: {}", column, nulls);
    }

    println!(
        "\ncodigo_ocorrencia unique: {}",
        table.is_unique("codigo_ocorrencia")?
    );

    // Key-column lookup, then back to ordinal addressing
    table.set_index("codigo_ocorrencia")?;
    if let Ok(row) = table.row_by_key(&Value::Int(40324)) {
        println!("occurrence 40324: {:?}", row);
    }
    table.reset_index();

    let table = Rc::new(table);
    let cache = Rc::new(QueryCache::new());

    println!("\nserious incidents in SP:");
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::eq(
            "ocorrencia_classificacao",
            Value::Str("INCIDENTE GRAVE".to_string()),
        ))
        .filter(Predicate::eq("ocorrencia_uf", Value::Str("SP".to_string())))
        .select(&["ocorrencia_cidade", "ocorrencia_dia", "ocorrencia_classificacao"])
        .execute()?;
    print!("{}", result);

    println!("cities starting with C:");
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::starts_with("ocorrencia_cidade", "C"))
        .select(&["ocorrencia_cidade", "ocorrencia_uf"])
        .limit(10)
        .execute()?;
    print!("{}", result);

    println!("occurrences mentioning MA or AL:");
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::contains_any("ocorrencia_cidade", &["MA", "AL"]))
        .select(&["ocorrencia_cidade"])
        .limit(10)
        .execute()?;
    print!("{}", result);

    println!("December 2015, days 3 to 8:");
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::year("ocorrencia_dia", 2015))
        .filter(Predicate::month("ocorrencia_dia", 12))
        .filter(Predicate::day_between("ocorrencia_dia", 3, 8))
        .select(&["ocorrencia_cidade", "ocorrencia_dia"])
        .execute()?;
    print!("{}", result);

    println!("March 2015 by classification (descending):");
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::year("ocorrencia_dia", 2015))
        .filter(Predicate::month("ocorrencia_dia", 3))
        .group_by("ocorrencia_classificacao")
        .sort_values(false)
        .execute()?;
    print!("{}", result);

    println!("southeast 2010, recommendation totals per city:");
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
        .filter(southeast.clone())
        .group_by("ocorrencia_cidade")
        .aggregate("total_recomendacoes", AggregateOp::Sum)
        .sort_values(false)
        .execute()?;
    print!("{}", result);

    println!("southeast 2010 by aerodrome, keeping the not-informed group:");
    let result = table
        .query_with_cache(&cache)
        .filter(Predicate::year("ocorrencia_dia", 2010))
        .filter(southeast)
        .group_by("ocorrencia_aerodromo")
        .aggregate("total_recomendacoes", AggregateOp::Sum)
        .execute()?;
    print!("{}", result);

    Ok(())
}
