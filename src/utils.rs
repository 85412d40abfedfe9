use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};

/// Determines the number of threads to use.
/// If `cli_threads` is 0, it uses all available logical cores.
/// Otherwise, it uses the number specified in `cli_threads`.
pub fn get_num_threads(cli_threads: usize) -> usize {
    let num_threads = if cli_threads == 0 {
        num_cpus::get()
    } else {
        cli_threads
    };
    debug!("Using {} threads for processing.", num_threads);
    num_threads
}

/// Initializes the Rayon global thread pool with the specified number of threads.
pub fn initialize_rayon_pool(num_threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;
    Ok(())
}

/// Runs `f` under a progress bar of `total` steps, logging elapsed wall time
/// and peak resident memory once it returns. Every long-running command
/// wraps its main loop with this, the same ambient observability pattern the
/// teacher's commands use.
pub fn track_progress_and_resources<F>(label: &str, total: u64, f: F) -> Result<()>
where
    F: FnOnce(&ProgressBar) -> Result<()>,
{
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]")
    {
        pb.set_style(style);
    }
    pb.set_message(label.to_string());
    let start = Instant::now();

    let result = f(&pb);

    pb.finish_and_clear();
    info!("{label}: finished in {:.2?}", start.elapsed());
    match psutil::process::Process::new(std::process::id()) {
        Ok(process) => match process.memory_info() {
            Ok(mem) => debug!("{label}: resident memory {} MiB", mem.rss() / (1024 * 1024)),
            Err(e) => debug!("{label}: could not read resident memory: {e}"),
        },
        Err(e) => debug!("{label}: could not inspect own process: {e}"),
    }
    result
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Opens `path` for reading, transparently decompressing by extension
/// (`.gz`, `.xz`, `.zst`, `.7z`). Plain files pass through untouched. `Send`
/// so it can back `needletail::parse_fastx_reader` for the archive formats
/// needletail cannot sniff on its own (`seq::NeedletailSource` handles plain
/// and `.gz` inputs directly; this covers `.xz`/`.zst`/`.7z` FASTA/FASTQ).
pub fn get_input_reader(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
    let reader: Box<dyn Read + Send> = match lowercase_extension(path).as_deref() {
        Some("gz") => Box::new(flate2::read::MultiGzDecoder::new(file)),
        Some("xz") => Box::new(xz2::read::XzDecoder::new(file)),
        Some("zst") => Box::new(zstd::stream::read::Decoder::new(file)?),
        Some("7z") => Box::new(Cursor::new(extract_single_file_7z(path)?)),
        _ => Box::new(file),
    };
    Ok(reader)
}

/// Creates `path` for writing, transparently compressing by extension
/// (`.gz`, `.xz`, `.zst`). `.7z` is not supported as a write target: the
/// archive format has no convenient single-stream writer in this crate's
/// dependency, so `.7z` output falls back to plain bytes with a warning.
pub fn get_output_writer(path: &Path) -> Result<Box<dyn Write>> {
    let file = File::create(path).with_context(|| format!("failed to create {path:?}"))?;
    let writer: Box<dyn Write> = match lowercase_extension(path).as_deref() {
        Some("gz") => Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::default())),
        Some("xz") => Box::new(xz2::write::XzEncoder::new(file, 6)),
        Some("zst") => Box::new(zstd::stream::write::Encoder::new(file, 0)?.auto_finish()),
        Some("7z") => {
            log::warn!("{path:?}: 7z output is not supported, writing uncompressed bytes");
            Box::new(file)
        }
        _ => Box::new(file),
    };
    Ok(writer)
}

fn extract_single_file_7z(path: &Path) -> Result<Vec<u8>> {
    let extract_dir = std::env::temp_dir().join(format!("orion-kmer-extract-{}", std::process::id()));
    fs::create_dir_all(&extract_dir)
        .with_context(|| format!("failed to create scratch directory {extract_dir:?}"))?;
    sevenz_rust2::decompress_file(path, &extract_dir)
        .with_context(|| format!("failed to extract 7z archive {path:?}"))?;
    let extracted = fs::read_dir(&extract_dir)
        .with_context(|| format!("failed to list extracted contents of {path:?}"))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("{path:?}: 7z archive contained no files"))?
        .with_context(|| format!("failed to read extracted entry from {path:?}"))?
        .path();
    let bytes = fs::read(&extracted).with_context(|| format!("failed to read {extracted:?}"))?;
    let _ = fs::remove_dir_all(&extract_dir);
    Ok(bytes)
}
