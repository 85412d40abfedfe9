//! The top-level `merylIndex` header: format identity, partitioning
//! parameters, and the whole-database histogram.

use crate::bits::BitStream;
use crate::errors::{OrionKmerError, Result};
use crate::kmer::KmerParams;

const MAGIC_HI: &[u8; 8] = b"merylInd";
const MAGIC_LO: &[u8; 8] = b"ex__v.03";
const FORMAT_VERSION: u32 = 3;

const FLAG_MULTISET: u32 = 0b01;
const FLAG_CANONICAL: u32 = 0b10;

/// Value above which an entry's count falls into the overflow histogram
/// bucket instead of an indexed one.
pub const HISTOGRAM_HUGE_THRESHOLD: u64 = 64;

/// Accumulated whole-database statistics, built incrementally as blocks are
/// written and then serialized once as the `merylIndex` file.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub k: u8,
    pub canonical: bool,
    pub multiset: bool,
    pub prefix_bits: u32,
    pub suffix_bits: u32,
    pub files_bits: u32,
    pub blocks_bits: u32,
    pub num_distinct: u64,
    pub num_unique: u64,
    pub num_total: u64,
    pub histogram: [u64; 64],
    pub histogram_huge: u64,
    pub histogram_max: u64,
}

impl DatabaseStats {
    pub fn new(params: &KmerParams, multiset: bool) -> Self {
        DatabaseStats {
            k: params.k(),
            canonical: params.canonical(),
            multiset,
            prefix_bits: params.prefix_bits(),
            suffix_bits: params.suffix_bits(),
            files_bits: params.files_bits(),
            blocks_bits: params.blocks_bits(),
            num_distinct: 0,
            num_unique: 0,
            num_total: 0,
            histogram: [0; 64],
            histogram_huge: 0,
            histogram_max: 0,
        }
    }

    /// Folds one distinct k-mer's final (post-coalescing) count into the
    /// running statistics.
    pub fn record_entry(&mut self, value: u64) {
        self.num_distinct += 1;
        self.num_total += value;
        if value == 1 {
            self.num_unique += 1;
        }
        if value < HISTOGRAM_HUGE_THRESHOLD {
            self.histogram[value as usize] += 1;
        } else {
            self.histogram_huge += 1;
        }
        self.histogram_max = self.histogram_max.max(value);
    }

    /// Every bucket's contribution plus the overflow count reconciles
    /// against the totals tracked independently. The overflow bucket only
    /// records a *count* of huge entries, not their summed value, so this
    /// check verifies distinct/unique accounting rather than a literal
    /// value-weighted total for entries at or above the threshold.
    pub fn histogram_is_self_consistent(&self) -> bool {
        let bucketed_distinct: u64 = self.histogram.iter().sum::<u64>() + self.histogram_huge;
        let unique_matches = self.num_unique == self.histogram[1];
        bucketed_distinct == self.num_distinct && unique_matches
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bs = BitStream::new();
        bs.put_bits(bytes_to_u64(MAGIC_HI), 64).unwrap();
        bs.put_bits(bytes_to_u64(MAGIC_LO), 64).unwrap();
        bs.put_bits(self.prefix_bits as u64, 32).unwrap();
        bs.put_bits(self.suffix_bits as u64, 32).unwrap();
        bs.put_bits(self.files_bits as u64, 32).unwrap();
        bs.put_bits(self.blocks_bits as u64, 32).unwrap();
        let mut flags = 0u32;
        if self.multiset {
            flags |= FLAG_MULTISET;
        }
        if self.canonical {
            flags |= FLAG_CANONICAL;
        }
        bs.put_bits(flags as u64, 32).unwrap();
        bs.put_bits(self.k as u64, 64).unwrap();
        bs.put_bits(self.num_distinct, 64).unwrap();
        bs.put_bits(self.num_unique, 64).unwrap();
        bs.put_bits(self.num_total, 64).unwrap();
        bs.put_bits(self.histogram_huge, 64).unwrap();
        bs.put_bits(self.histogram_max, 64).unwrap();
        for &bucket in &self.histogram {
            bs.put_bits(bucket, 64).unwrap();
        }
        bs.flush();
        bs.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut bs = BitStream::from_bytes(bytes.to_vec(), bytes.len() as u64 * 8);
        let magic_hi = bs.get_bits(64)?;
        let magic_lo = bs.get_bits(64)?;
        if magic_hi != bytes_to_u64(MAGIC_HI) || magic_lo != bytes_to_u64(MAGIC_LO) {
            return Err(OrionKmerError::CorruptData("merylIndex magic mismatch".into()));
        }
        let prefix_bits = bs.get_bits(32)? as u32;
        let suffix_bits = bs.get_bits(32)? as u32;
        let files_bits = bs.get_bits(32)? as u32;
        let blocks_bits = bs.get_bits(32)? as u32;
        let flags = bs.get_bits(32)? as u32;
        let k = bs.get_bits(64)? as u8;
        let num_distinct = bs.get_bits(64)?;
        let num_unique = bs.get_bits(64)?;
        let num_total = bs.get_bits(64)?;
        let histogram_huge = bs.get_bits(64)?;
        let histogram_max = bs.get_bits(64)?;
        let mut histogram = [0u64; 64];
        for slot in histogram.iter_mut() {
            *slot = bs.get_bits(64)?;
        }
        Ok(DatabaseStats {
            k,
            canonical: flags & FLAG_CANONICAL != 0,
            multiset: flags & FLAG_MULTISET != 0,
            prefix_bits,
            suffix_bits,
            files_bits,
            blocks_bits,
            num_distinct,
            num_unique,
            num_total,
            histogram,
            histogram_huge,
            histogram_max,
        })
    }
}

/// The supported on-disk format version; `DatabaseReader::open` fails with
/// `VersionMismatch` if an index reports anything else (there is currently
/// only one version to check against, `FORMAT_VERSION`, embedded in the
/// magic string itself rather than a separate field).
pub fn supported_format_version() -> u32 {
    FORMAT_VERSION
}

fn bytes_to_u64(b: &[u8; 8]) -> u64 {
    b.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64)
}
