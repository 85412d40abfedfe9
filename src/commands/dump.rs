//! `dump`: stream a database's `(kmer, count)` pairs as TSV or CSV.

use std::io::Write;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{DumpArgs, DumpFormat},
    db::DatabaseReader,
};

pub fn run_dump(args: DumpArgs) -> Result<()> {
    info!("dumping {:?} (min_count={})", args.database, args.min_count);
    let reader = DatabaseReader::open(&args.database)
        .with_context(|| format!("failed to open database {:?}", args.database))?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => crate::utils::get_output_writer(path)?,
        None => Box::new(std::io::stdout()),
    };

    let mut written = 0u64;
    match args.format {
        DumpFormat::Tsv => {
            for item in reader.stream() {
                let (kmer, count) = item?;
                if count < args.min_count {
                    continue;
                }
                let seq = String::from_utf8(kmer.to_seq()).expect("2-bit alphabet is always ASCII");
                writeln!(out, "{seq}\t{count}")?;
                written += 1;
            }
        }
        DumpFormat::Csv => {
            let mut csv_writer = csv::Writer::from_writer(&mut out);
            csv_writer.write_record(["kmer", "count"])?;
            for item in reader.stream() {
                let (kmer, count) = item?;
                if count < args.min_count {
                    continue;
                }
                let seq = String::from_utf8(kmer.to_seq()).expect("2-bit alphabet is always ASCII");
                csv_writer.write_record(&[seq, count.to_string()])?;
                written += 1;
            }
            csv_writer.flush()?;
        }
    }
    out.flush().context("failed to flush dump output")?;
    info!("wrote {written} records (min_count={})", args.min_count);
    Ok(())
}
