//! Random and streaming access over a persisted database: file index ->
//! block index -> decoded `(Kmer, value)` pairs.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use super::block::{DecodedBlock, decode_block};
use super::index::DatabaseStats;
use crate::errors::{OrionKmerError, Result};
use crate::kmer::{Kmer, KmerParams};

const TRAILER_MAGIC: &[u8; 8] = b"merylEnd";

struct FileCache {
    bytes: Vec<u8>,
    index: Vec<(u64, u64, u64, u64)>, // (prefix, offset, count, byteLen)
}

pub struct DatabaseReader {
    dir: PathBuf,
    stats: DatabaseStats,
    params: KmerParams,
    files: Vec<OnceLock<FileCache>>,
    block_cache: Mutex<Option<(u64, DecodedBlock)>>,
}

impl DatabaseReader {
    pub fn open(dir: &Path) -> Result<Self> {
        let index_path = dir.join("merylIndex");
        if !index_path.exists() {
            return Err(OrionKmerError::FileNotFound(index_path.display().to_string()));
        }
        let bytes = fs::read(&index_path)?;
        let stats = DatabaseStats::decode(&bytes)?;
        let params = KmerParams::new(stats.k, stats.canonical, stats.blocks_bits)?;

        let num_files = params.num_files();
        let files = (0..num_files).map(|_| OnceLock::new()).collect();
        Ok(DatabaseReader { dir: dir.to_path_buf(), stats, params, files, block_cache: Mutex::new(None) })
    }

    pub fn params(&self) -> &KmerParams {
        &self.params
    }

    pub fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    fn load_file_cache(&self, file_idx: u64) -> Result<FileCache> {
        let path = self.dir.join(format!("{file_idx:04}.data"));
        let bytes = fs::read(&path)?;
        let blocks_per_file = 1u64 << self.params.blocks_bits();
        let trailer_len = blocks_per_file as usize * 32 + 4 + 8;
        if bytes.len() < trailer_len {
            return Err(OrionKmerError::CorruptData(format!(
                "{path:?} is too short to contain a valid trailer"
            )));
        }
        let magic_start = bytes.len() - 8;
        if &bytes[magic_start..] != TRAILER_MAGIC {
            return Err(OrionKmerError::CorruptBlock(format!("{path:?} trailer magic mismatch")));
        }
        let blocks_bits_start = magic_start - 4;
        let stored_blocks_bits = u32::from_be_bytes(bytes[blocks_bits_start..magic_start].try_into().unwrap());
        if stored_blocks_bits != self.params.blocks_bits() {
            return Err(OrionKmerError::CorruptData(format!(
                "{path:?} trailer blocksBits {stored_blocks_bits} does not match merylIndex"
            )));
        }
        let index_start = blocks_bits_start - blocks_per_file as usize * 32;
        let mut index = Vec::with_capacity(blocks_per_file as usize);
        let mut cursor = index_start;
        for _ in 0..blocks_per_file {
            let prefix = u64::from_be_bytes(bytes[cursor..cursor + 8].try_into().unwrap());
            let offset = u64::from_be_bytes(bytes[cursor + 8..cursor + 16].try_into().unwrap());
            let count = u64::from_be_bytes(bytes[cursor + 16..cursor + 24].try_into().unwrap());
            let byte_len = u64::from_be_bytes(bytes[cursor + 24..cursor + 32].try_into().unwrap());
            index.push((prefix, offset, count, byte_len));
            cursor += 32;
        }
        Ok(FileCache { bytes, index })
    }

    fn file_cache(&self, file_idx: u64) -> Result<&FileCache> {
        if let Some(cache) = self.files[file_idx as usize].get() {
            return Ok(cache);
        }
        let loaded = self.load_file_cache(file_idx)?;
        let _ = self.files[file_idx as usize].set(loaded);
        Ok(self.files[file_idx as usize].get().expect("just initialized"))
    }

    /// Returns the decoded entries for `prefix`'s block, or `None` if that
    /// prefix owns no block (an empty trailer slot).
    fn block_entries_for_prefix(&self, prefix: u64) -> Result<Option<Vec<(u64, u64)>>> {
        let file_idx = self.params.file_for_prefix(prefix);
        let blocks_per_file = 1u64 << self.params.blocks_bits();
        let local_idx = (prefix & (blocks_per_file - 1)) as usize;
        let cache = self.file_cache(file_idx)?;
        let (stored_prefix, offset, count, byte_len) = cache.index[local_idx];
        if count == 0 {
            return Ok(None);
        }
        let block_bytes = &cache.bytes[offset as usize..(offset + byte_len) as usize];
        let decoded = decode_block(block_bytes)?;
        if decoded.prefix != stored_prefix || decoded.prefix != prefix {
            return Err(OrionKmerError::CorruptBlock(format!(
                "trailer prefix {prefix} does not match decoded block prefix {}",
                decoded.prefix
            )));
        }
        Ok(Some(decoded.entries))
    }

    fn build_kmer(&self, prefix: u64, suffix: u64) -> Result<Kmer> {
        let value = ((prefix as u128) << self.params.suffix_bits()) | suffix as u128;
        Kmer::new(value, self.params.k())
    }

    /// `O(log N + suffixBits)`: locates the owning block (cached across
    /// repeated calls for the same block) and binary-searches its decoded
    /// suffix list.
    pub fn exists(&self, kmer: &Kmer) -> Result<bool> {
        Ok(self.count(kmer)?.is_some())
    }

    /// Returns the value column entry for `kmer`, or `None` if it is absent.
    pub fn count(&self, kmer: &Kmer) -> Result<Option<u32>> {
        let prefix_bits = self.params.prefix_bits();
        let prefix = kmer.prefix(prefix_bits);
        let suffix = kmer.suffix(prefix_bits);

        let mut cache = self.block_cache.lock().unwrap();
        if cache.as_ref().map(|(p, _)| *p) != Some(prefix) {
            match self.block_entries_for_prefix(prefix)? {
                Some(entries) => *cache = Some((prefix, DecodedBlock { prefix, entries })),
                None => *cache = None,
            }
        }
        let found = match cache.as_ref() {
            Some((_, block)) => {
                block.entries.binary_search_by_key(&suffix, |&(s, _)| s).ok().map(|i| block.entries[i].1 as u32)
            }
            None => None,
        };
        Ok(found)
    }

    /// All entries in increasing prefix-then-suffix order.
    pub fn stream(&self) -> DatabaseStream<'_> {
        self.stream_range(0, self.params.num_prefixes())
    }

    /// Same contract as `stream`, restricted to `[lo_prefix, hi_prefix)`.
    pub fn stream_range(&self, lo_prefix: u64, hi_prefix: u64) -> DatabaseStream<'_> {
        DatabaseStream {
            reader: self,
            next_prefix: lo_prefix,
            hi_prefix,
            current_prefix: 0,
            current_entries: Vec::new().into_iter(),
        }
    }
}

/// A lazy, on-demand-per-block iterator over a database's entries.
pub struct DatabaseStream<'a> {
    reader: &'a DatabaseReader,
    next_prefix: u64,
    hi_prefix: u64,
    current_prefix: u64,
    current_entries: std::vec::IntoIter<(u64, u64)>,
}

impl<'a> Iterator for DatabaseStream<'a> {
    type Item = Result<(Kmer, u32)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((suffix, value)) = self.current_entries.next() {
                return Some(
                    self.reader.build_kmer(self.current_prefix, suffix).map(|k| (k, value as u32)),
                );
            }
            if self.next_prefix >= self.hi_prefix {
                return None;
            }
            let prefix = self.next_prefix;
            self.next_prefix += 1;
            match self.reader.block_entries_for_prefix(prefix) {
                Ok(Some(entries)) => {
                    self.current_prefix = prefix;
                    self.current_entries = entries.into_iter();
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::writer::DatabaseWriter;
    use tempfile::tempdir;

    fn build_sample_database(dir: &Path) -> KmerParams {
        let params = KmerParams::new(16, true, 2).unwrap();
        let writer = DatabaseWriter::create(dir, params, false).unwrap();
        writer.write_block(0, params.suffix_bits(), &[(1, 2), (5, 1), (9, 3)]).unwrap();
        writer.write_block(3, params.suffix_bits(), &[(2, 7)]).unwrap();
        writer.finish().unwrap();
        params
    }

    #[test]
    fn open_rejects_missing_meryl_index() {
        let dir = tempdir().unwrap();
        assert!(DatabaseReader::open(dir.path()).is_err());
    }

    #[test]
    fn count_finds_present_entries_and_misses_absent_ones() {
        let dir = tempdir().unwrap();
        let params = build_sample_database(dir.path());
        let reader = DatabaseReader::open(dir.path()).unwrap();

        let value = ((0u128) << params.suffix_bits()) | 5u128;
        let kmer = Kmer::new(value, params.k()).unwrap();
        assert_eq!(reader.count(&kmer).unwrap(), Some(1));

        let missing_value = ((0u128) << params.suffix_bits()) | 999u128;
        let missing = Kmer::new(missing_value, params.k()).unwrap();
        assert_eq!(reader.count(&missing).unwrap(), None);
    }

    #[test]
    fn stream_yields_entries_in_increasing_prefix_order() {
        let dir = tempdir().unwrap();
        build_sample_database(dir.path());
        let reader = DatabaseReader::open(dir.path()).unwrap();
        let entries: Vec<(Kmer, u32)> = reader.stream().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].1, 2);
        assert_eq!(entries[3].1, 7);
    }

    #[test]
    fn stream_range_restricts_to_a_sub_range() {
        let dir = tempdir().unwrap();
        build_sample_database(dir.path());
        let reader = DatabaseReader::open(dir.path()).unwrap();
        let entries: Vec<(Kmer, u32)> =
            reader.stream_range(1, 4).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, 7);
    }
}
