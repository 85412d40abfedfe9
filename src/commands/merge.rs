//! `merge` / `intersect`: open N DatabaseReaders and stream them through a
//! `MergeEngine`, writing the reduced result through a fresh `DatabaseWriter`.

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::MergeArgs,
    db::{DatabaseReader, DatabaseWriter, MergeEngine, Reducer},
};

fn run_with_reducer(args: MergeArgs, reducer: Reducer) -> Result<()> {
    info!("merging {} databases with reducer {:?}", args.inputs.len(), reducer);

    let readers: Vec<DatabaseReader> = args
        .inputs
        .iter()
        .map(|path| {
            DatabaseReader::open(path).with_context(|| format!("failed to open database {path:?}"))
        })
        .collect::<Result<_>>()?;
    let refs: Vec<&DatabaseReader> = readers.iter().collect();
    let params = *refs[0].params();

    let engine = MergeEngine::open(refs, reducer).context("merge inputs are incompatible")?;
    let writer = DatabaseWriter::create(&args.output, params, false)
        .with_context(|| format!("failed to initialize output database at {:?}", args.output))?;
    engine.run(&writer)?;
    let stats = writer.finish().context("failed to finalize the merged database")?;

    info!(
        "wrote {:?}: {} distinct k-mers, {} total",
        args.output, stats.num_distinct, stats.num_total
    );
    Ok(())
}

pub fn run_merge(args: MergeArgs) -> Result<()> {
    run_with_reducer(args, Reducer::Sum)
}

pub fn run_intersect(args: MergeArgs) -> Result<()> {
    run_with_reducer(args, Reducer::And)
}
