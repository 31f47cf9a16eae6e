use std::fs::File;
use std::io::{BufWriter, Write};

use rand::Rng;

/// Writes a synthetic CENIPA-style occurrence file, sentinel tokens
/// included, for manual runs and benches.
fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ocorrencia.csv".to_string());
    let rows: usize = std::env::args()
        .nth(2)
        .and_then(|n| n.parse().ok())
        .unwrap_or(100_000);

    let file = File::create(&path).unwrap();
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "codigo_ocorrencia;codigo_ocorrencia2;ocorrencia_classificacao;ocorrencia_cidade;ocorrencia_uf;ocorrencia_aerodromo;ocorrencia_dia;ocorrencia_hora;total_recomendacoes"
    )
    .unwrap();

    let classifications = ["INCIDENTE", "INCIDENTE GRAVE", "ACIDENTE"];
    let cities = [
        "SAO PAULO",
        "RIO DE JANEIRO",
        "CURITIBA",
        "MACEIO",
        "MANAUS",
        "BELO HORIZONTE",
    ];
    let states = ["SP", "RJ", "PR", "AL", "AM", "MG", "**"];
    let aerodromes = ["SBSP", "SBRJ", "SBBI", "SBMO", "****", "###!"];

    let mut rng = rand::rng();
    for i in 0..rows {
        let classification = classifications[rng.random_range(0..classifications.len())];
        let city = cities[rng.random_range(0..cities.len())];
        let state = states[rng.random_range(0..states.len())];
        let aerodrome = aerodromes[rng.random_range(0..aerodromes.len())];
        let day = rng.random_range(1..=28);
        let month = rng.random_range(1..=12);
        let year = rng.random_range(2008..=2015);
        let hour: &str = if rng.random_range(0..10) == 0 {
            "NULL"
        } else {
            ["09:30", "12:30:00", "17:00", "23:15"][rng.random_range(0..4)]
        };
        let total = rng.random_range(0..12);
        writeln!(
            writer,
            "{};{};{};{};{};{};{:02}/{:02}/{};{};{}",
            40000 + i,
            40000 + i,
            classification,
            city,
            state,
            aerodrome,
            day,
            month,
            year,
            hour,
            total
        )
        .unwrap();
    }

    println!("Sample occurrence CSV generated: {} ({} rows)", path, rows);
}
