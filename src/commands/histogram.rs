//! `histogram`: print a database's count -> frequency table, either trusting
//! the `merylIndex` totals or recomputing them by streaming.

use std::fs::File;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::{
    cli::HistogramArgs,
    db::{DatabaseReader, DatabaseStats, index::HISTOGRAM_HUGE_THRESHOLD},
};

#[derive(Serialize, Debug)]
struct HistogramReport {
    database: String,
    k: u8,
    canonical: bool,
    multiset: bool,
    num_distinct: u64,
    num_unique: u64,
    num_total: u64,
    buckets: Vec<(u64, u64)>,
    huge_threshold: u64,
    huge_count: u64,
}

fn recompute(reader: &DatabaseReader) -> Result<DatabaseStats> {
    let mut stats = DatabaseStats::new(reader.params(), reader.stats().multiset);
    for item in reader.stream() {
        let (_, count) = item?;
        stats.record_entry(count as u64);
    }
    Ok(stats)
}

pub fn run_histogram(args: HistogramArgs) -> Result<()> {
    let reader = DatabaseReader::open(&args.database)
        .with_context(|| format!("failed to open database {:?}", args.database))?;

    let stats = if args.recompute {
        info!("recomputing histogram for {:?} by streaming", args.database);
        recompute(&reader)?
    } else {
        reader.stats().clone()
    };

    println!("Count\tFrequency");
    for (count, freq) in stats.histogram.iter().enumerate() {
        if *freq > 0 {
            println!("{count}\t{freq}");
        }
    }
    if stats.histogram_huge > 0 {
        println!(">={HISTOGRAM_HUGE_THRESHOLD}\t{}", stats.histogram_huge);
    }
    println!(
        "# distinct={} unique={} total={}",
        stats.num_distinct, stats.num_unique, stats.num_total
    );

    if let Some(json_path) = &args.json {
        let report = HistogramReport {
            database: args.database.display().to_string(),
            k: stats.k,
            canonical: stats.canonical,
            multiset: stats.multiset,
            num_distinct: stats.num_distinct,
            num_unique: stats.num_unique,
            num_total: stats.num_total,
            buckets: stats
                .histogram
                .iter()
                .enumerate()
                .filter(|&(_, &freq)| freq > 0)
                .map(|(count, &freq)| (count as u64, freq))
                .collect(),
            huge_threshold: HISTOGRAM_HUGE_THRESHOLD,
            huge_count: stats.histogram_huge,
        };
        let file = File::create(json_path)
            .with_context(|| format!("failed to create JSON report at {json_path:?}"))?;
        serde_json::to_writer_pretty(file, &report)
            .with_context(|| format!("failed to write JSON report to {json_path:?}"))?;
        info!("wrote JSON histogram report to {json_path:?}");
    }

    Ok(())
}
