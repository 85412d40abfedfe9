//! `count`: FASTA/FASTQ inputs -> KmerEncoder -> CountArray -> DatabaseWriter.

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    cli::CountArgs,
    count::CountArray,
    db::DatabaseWriter,
    kmer::{KmerEncoder, KmerEncoderConfig, KmerParams},
    seq::{NeedletailSource, SequenceSource},
    utils::track_progress_and_resources,
};

pub fn run_count(args: CountArgs) -> Result<()> {
    info!("Starting count command with args: {:?}", args);

    let canonical = !args.forward_only;
    let params = KmerParams::new(args.kmer_size, canonical, args.blocks_bits)
        .context("invalid k-mer size / blocks-bits combination for the persistent database layer")?;

    let memory_budget = args.memory_budget_mb.saturating_mul(1024 * 1024);
    let count_array = CountArray::new(memory_budget);
    count_array.initialize(params.suffix_bits());
    count_array.enable_multiset(args.multiset);

    let writer = DatabaseWriter::create(&args.output, params, args.multiset)
        .with_context(|| format!("failed to initialize output database at {:?}", args.output))?;

    let num_files = args.input_files.len() as u64;
    let mut total_records = 0u64;
    let mut total_bases = 0u64;

    track_progress_and_resources("Counting k-mers from input files", num_files, |pb_files| {
        for input_path in &args.input_files {
            let path_str = input_path.to_string_lossy();
            pb_files.set_message(format!("Processing: {path_str}"));
            info!("Processing file: {path_str}");

            let mut source = NeedletailSource::open(input_path)
                .with_context(|| format!("failed to open or parse {path_str}"))?;
            let mut encoder = KmerEncoder::new(params, KmerEncoderConfig::default())
                .context("failed to construct KmerEncoder")?;

            let mut record_count = 0u64;
            while let Some(record) = source
                .next_record()
                .with_context(|| format!("error reading a record from {path_str}"))?
            {
                encoder.reset();
                for &base in &record.seq {
                    encoder.add_base(base);
                    if encoder.has_kmer() {
                        let kmer = if canonical { encoder.canonical() } else { encoder.forward() }
                            .expect("has_kmer() implies forward()/canonical() are Some");
                        let prefix = kmer.prefix(params.prefix_bits());
                        let suffix = kmer.suffix(params.prefix_bits());
                        count_array.add(prefix, suffix)?;
                    }
                }
                total_bases += record.seq.len() as u64;
                record_count += 1;
                if record_count % 100_000 == 0 {
                    debug!("processed {record_count} records from {path_str}");
                    count_array.maybe_drain(&writer)?;
                }
            }
            info!("finished {path_str}: {record_count} records");
            total_records += record_count;
            pb_files.inc(1);
            count_array.maybe_drain(&writer)?;
        }
        Ok(())
    })?;

    info!("draining the remaining {} in-memory buckets", count_array.prefixes().len());
    for prefix in count_array.prefixes() {
        count_array.dump_counted_kmers(prefix, &writer)?;
        count_array.remove_counted_kmers(prefix);
    }

    let stats = writer.finish().context("failed to finalize the output database")?;
    info!(
        "wrote {:?}: {} records, {} bases, {} distinct k-mers, {} total k-mers",
        args.output, total_records, total_bases, stats.num_distinct, stats.num_total
    );

    Ok(())
}
