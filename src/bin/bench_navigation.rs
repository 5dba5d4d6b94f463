use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::time::Instant;

use prettytable::{row, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use xbwt_index::{CodecKind, IndexConfig, XbwtIndex};

/// Timings of one navigation primitive under one codec
struct BenchmarkResult {
    codec: CodecKind,
    operation: &'static str,
    queries: usize,
    average_time: f64,
    blocks_per_query: f64,
    bytes_per_query: f64,
}

fn benchmark(index: &XbwtIndex, codec: CodecKind, rows: &[usize]) -> anyhow::Result<Vec<BenchmarkResult>> {
    let mut results = Vec::new();
    let operations: [&'static str; 3] = ["parent", "children", "text"];

    for operation in operations {
        let mut nav = index.navigator();
        let start = Instant::now();
        for &row in rows {
            match operation {
                "parent" => {
                    if row > 0 {
                        nav.parent(row)?;
                    }
                }
                "children" => {
                    nav.children(row)?;
                }
                _ => {
                    nav.text_content(row)?;
                }
            }
        }
        let elapsed = start.elapsed().as_secs_f64();
        let stats = nav.stats();
        results.push(BenchmarkResult {
            codec,
            operation,
            queries: rows.len(),
            average_time: elapsed / rows.len() as f64,
            blocks_per_query: stats.total_blocks() as f64 / rows.len() as f64,
            bytes_per_query: stats.total_bytes() as f64 / rows.len() as f64,
        });
    }
    Ok(results)
}

/// Print benchmark results in a human-readable format
fn print_benchmark_results(results: &[BenchmarkResult]) {
    let mut table = Table::new();
    table.add_row(row![
        "Codec",
        "Operation",
        "Queries",
        "Avg Time (us)",
        "Blocks/Query",
        "Bytes/Query",
    ]);
    for result in results {
        table.add_row(row![
            result.codec,
            result.operation,
            result.queries,
            format!("{:.3}", result.average_time * 1e6),
            format!("{:.2}", result.blocks_per_query),
            format!("{:.1}", result.bytes_per_query),
        ]);
    }
    table.printstd();
}

fn generate_rows(n_rows: usize, n_queries: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_queries).map(|_| rng.gen_range(0..n_rows)).collect()
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <document.xml> [queries]", args[0]);
        process::exit(1);
    }
    let path = Path::new(&args[1]);
    let n_queries: usize = match args.get(2) {
        Some(n) => n.parse()?,
        None => 10_000,
    };
    let seed = 42;
    let xml = fs::read(path)?;

    let mut results = Vec::new();
    for codec in CodecKind::ALL {
        let config = IndexConfig {
            codec,
            ..IndexConfig::default()
        };
        let start = Instant::now();
        let index = XbwtIndex::from_xml(&xml, &config)?;
        let image = index.to_bytes()?;
        println!(
            "{}: built in {:.2}s, {:.2} MB -> {:.2} MB",
            codec,
            start.elapsed().as_secs_f64(),
            xml.len() as f64 / (1024.0 * 1024.0),
            image.len() as f64 / (1024.0 * 1024.0)
        );
        let rows = generate_rows(index.len(), n_queries, seed);
        results.extend(benchmark(&index, codec, &rows)?);
    }

    print_benchmark_results(&results);
    Ok(())
}
