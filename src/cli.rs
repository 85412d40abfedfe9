use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    #[clap(
        short,
        long,
        global = true,
        default_value_t = 0,
        help = "Number of threads to use (0 for all logical cores)"
    )]
    pub threads: usize,

    #[clap(short, long, global = true, action = clap::ArgAction::Count, help = "Verbosity level (e.g., -v, -vv)")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count k-mers from FASTA/FASTQ inputs into a persistent database
    Count(CountArgs),
    /// Merge two or more databases, summing counts for shared k-mers
    Merge(MergeArgs),
    /// Intersect two or more databases, keeping only k-mers common to all
    Intersect(MergeArgs),
    /// Stream a database's (kmer, count) pairs as a TSV
    Dump(DumpArgs),
    /// Print a database's count -> frequency histogram
    Histogram(HistogramArgs),
}

#[derive(Parser, Debug)]
pub struct CountArgs {
    #[clap(short, long, required = true, help = "The length of the k-mer (1..=64, 1..=32 for persistent output)")]
    pub kmer_size: u8,

    #[clap(short, long, required = true, num_args = 1.., help = "One or more input FASTA/FASTQ files (.gz/.xz/.zst/.7z accepted)")]
    pub input_files: Vec<PathBuf>,

    #[clap(short, long, required = true, help = "Output database directory (conventionally named <name>.meryl)")]
    pub output: PathBuf,

    #[clap(long, default_value_t = false, help = "Count forward-strand k-mers only instead of canonical k-mers")]
    pub forward_only: bool,

    #[clap(long, default_value_t = false, help = "Keep every occurrence as a separate entry instead of coalescing counts")]
    pub multiset: bool,

    #[clap(
        long,
        default_value_t = 8,
        help = "log2 of blocks per file; controls how finely the prefix space is partitioned"
    )]
    pub blocks_bits: u32,

    #[clap(
        long,
        default_value_t = 4096,
        help = "Approximate in-memory budget for the counting buckets, in mebibytes"
    )]
    pub memory_budget_mb: usize,
}

#[derive(Parser, Debug)]
pub struct MergeArgs {
    #[clap(required = true, num_args = 2.., help = "Two or more input database directories")]
    pub inputs: Vec<PathBuf>,

    #[clap(short, long, required = true, help = "Output database directory")]
    pub output: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpFormat {
    Tsv,
    Csv,
}

#[derive(Parser, Debug)]
pub struct DumpArgs {
    #[clap(required = true, help = "Database directory to stream")]
    pub database: PathBuf,

    #[clap(short, long, help = "Output file (defaults to stdout)")]
    pub output: Option<PathBuf>,

    #[clap(short = 'c', long, default_value_t = 1, help = "Minimum count for a k-mer to be printed")]
    pub min_count: u32,

    #[clap(long, value_enum, default_value_t = DumpFormat::Tsv, help = "Output record format")]
    pub format: DumpFormat,
}

#[derive(Parser, Debug)]
pub struct HistogramArgs {
    #[clap(required = true, help = "Database directory to summarize")]
    pub database: PathBuf,

    #[clap(long, default_value_t = false, help = "Recompute the histogram by streaming instead of trusting merylIndex")]
    pub recompute: bool,

    #[clap(long, help = "Also write the histogram as a JSON report to this path")]
    pub json: Option<PathBuf>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
