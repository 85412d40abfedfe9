//! Partitions the prefix space across `2^filesBits` output files and
//! coordinates parallel block emission.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::info;
use rayon::prelude::*;

use super::block::encode_block;
use super::index::DatabaseStats;
use crate::count::BlockSink;
use crate::errors::{OrionKmerError, Result};
use crate::kmer::KmerParams;

const TRAILER_MAGIC: &[u8; 8] = b"merylEnd";

/// One output file's accumulated bytes and block index, guarded by its own
/// mutex so files never contend with each other.
struct FileState {
    buffer: Vec<u8>,
    index: Vec<(u64, u64, u64, u64)>, // (prefix, offset, count, byteLen)
}

pub struct DatabaseWriter {
    dir: PathBuf,
    params: KmerParams,
    multiset: bool,
    blocks_per_file: u64,
    files: Vec<Mutex<FileState>>,
    stats: Mutex<DatabaseStats>,
}

impl DatabaseWriter {
    pub fn create(dir: &Path, params: KmerParams, multiset: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let num_files = params.num_files();
        let blocks_per_file = 1u64 << params.blocks_bits();
        let files = (0..num_files)
            .map(|_| {
                Mutex::new(FileState {
                    buffer: Vec::new(),
                    index: vec![(0, 0, 0, 0); blocks_per_file as usize],
                })
            })
            .collect();
        Ok(DatabaseWriter {
            dir: dir.to_path_buf(),
            params,
            multiset,
            blocks_per_file,
            files,
            stats: Mutex::new(DatabaseStats::new(&params, multiset)),
        })
    }

    pub fn params(&self) -> &KmerParams {
        &self.params
    }

    pub fn is_multiset(&self) -> bool {
        self.multiset
    }

    fn data_file_name(idx: u64) -> String {
        format!("{idx:04}.data")
    }

    /// Writes one prefix's finished block. The caller-visible entry point
    /// matching `BlockSink`; also used directly by the final sweep over any
    /// buckets a `CountArray` had not yet drained under memory pressure.
    ///
    /// Write-after-`finish()` is a compile-time error rather than a runtime
    /// one: `finish` takes `self` by value, so no reference to the writer
    /// survives it.
    fn write_block_inner(&self, prefix: u64, suffix_bits: u32, entries: &[(u64, u64)]) -> Result<()> {
        let file_idx = self.params.file_for_prefix(prefix);
        if file_idx >= self.params.num_files() {
            return Err(OrionKmerError::InvalidState(format!(
                "prefix {prefix} does not belong to any opened file's range"
            )));
        }
        let local_idx = (prefix & (self.blocks_per_file - 1)) as usize;

        let bytes = encode_block(prefix, suffix_bits, entries, None)?;
        let byte_len = bytes.len() as u64;

        let mut file = self.files[file_idx as usize].lock().unwrap();
        let offset = file.buffer.len() as u64;
        file.buffer.extend_from_slice(&bytes);
        file.index[local_idx] = (prefix, offset, entries.len() as u64, byte_len);
        drop(file);

        let mut stats = self.stats.lock().unwrap();
        for &(_, value) in entries {
            stats.record_entry(value);
        }
        Ok(())
    }

    /// Emits every file's trailer, writes the files to disk in parallel (one
    /// `rayon` task per file, matching the one-writer-thread-per-file model),
    /// then writes the top-level `merylIndex` once all files have closed.
    pub fn finish(self) -> Result<DatabaseStats> {
        let dir = self.dir.clone();
        let blocks_bits = self.params.blocks_bits();

        let results: Vec<Result<()>> = self
            .files
            .par_iter()
            .enumerate()
            .map(|(idx, file_mutex)| -> Result<()> {
                let file = file_mutex.lock().unwrap();
                let mut out = file.buffer.clone();
                for &(prefix, offset, count, byte_len) in &file.index {
                    out.extend_from_slice(&prefix.to_be_bytes());
                    out.extend_from_slice(&offset.to_be_bytes());
                    out.extend_from_slice(&count.to_be_bytes());
                    out.extend_from_slice(&byte_len.to_be_bytes());
                }
                out.extend_from_slice(&(blocks_bits).to_be_bytes());
                out.extend_from_slice(TRAILER_MAGIC);
                let path = dir.join(Self::data_file_name(idx as u64));
                fs::write(&path, out)?;
                Ok(())
            })
            .collect();
        for r in results {
            r?;
        }

        let stats = self.stats.into_inner().unwrap();
        fs::write(dir.join("merylIndex"), stats.encode())?;
        info!(
            "wrote k-mer database to {:?}: {} distinct, {} total",
            dir, stats.num_distinct, stats.num_total
        );
        Ok(stats)
    }
}

impl BlockSink for DatabaseWriter {
    fn write_block(&self, prefix: u64, suffix_bits: u32, entries: &[(u64, u64)]) -> Result<()> {
        self.write_block_inner(prefix, suffix_bits, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::block::decode_block;
    use tempfile::tempdir;

    #[test]
    fn writes_a_block_and_reconstructs_it_from_the_file() {
        let dir = tempdir().unwrap();
        let params = KmerParams::new(16, true, 2).unwrap();
        let writer = DatabaseWriter::create(dir.path(), params, false).unwrap();
        let entries = vec![(1u64, 2u64), (5, 1), (9, 3)];
        writer.write_block(3, params.suffix_bits(), &entries).unwrap();
        let stats = writer.finish().unwrap();
        assert_eq!(stats.num_distinct, 3);
        assert_eq!(stats.num_total, 6);

        let file_idx = params.file_for_prefix(3);
        let bytes = fs::read(dir.path().join(format!("{file_idx:04}.data"))).unwrap();
        let decoded = decode_block(&bytes[0..bytes.len() - 8 - 4 - 32 * (1 << params.blocks_bits())])
            .unwrap();
        assert_eq!(decoded.prefix, 3);
        assert_eq!(decoded.entries, entries);
    }

    #[test]
    fn rejects_prefix_outside_any_files_range() {
        let dir = tempdir().unwrap();
        let params = KmerParams::new(16, true, 2).unwrap();
        let writer = DatabaseWriter::create(dir.path(), params, false).unwrap();
        let out_of_range = params.num_prefixes(); // one past the valid range
        assert!(writer.write_block(out_of_range, params.suffix_bits(), &[(1, 1)]).is_err());
    }
}
