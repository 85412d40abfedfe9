use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use dashmap::DashMap;
use log::debug;

use super::bucket::Bucket;
use crate::bits::bit_length;
use crate::errors::{OrionKmerError, Result};

/// Borrowed collaborator that receives a bucket's sorted `(suffix, value)`
/// entries once `count_kmers` has run. `BlockWriter`/`DatabaseWriter`
/// implement this; `CountArray` never holds a long-lived reference to its
/// sink, only a borrow for the duration of one `dump_counted_kmers` call (no
/// cyclic bucket-writer references).
pub trait BlockSink {
    fn write_block(&self, prefix: u64, suffix_bits: u32, entries: &[(u64, u64)]) -> Result<()>;
}

/// In-memory prefix-bucketed accumulator. Each prefix owns a `Bucket`
/// (suffix column + value column); buckets are created lazily in a
/// concurrent map on first touch rather than eagerly for the whole prefix
/// space, which is equivalent but far cheaper when most prefixes are sparse
/// during early ingestion.
pub struct CountArray {
    buckets: DashMap<u64, Bucket>,
    suffix_bits: AtomicU32,
    value_width: AtomicU32,
    multiset: AtomicBool,
    memory_budget: usize,
    memory_used: AtomicUsize,
}

impl CountArray {
    pub fn new(memory_budget: usize) -> Self {
        CountArray {
            buckets: DashMap::new(),
            suffix_bits: AtomicU32::new(1),
            value_width: AtomicU32::new(1),
            multiset: AtomicBool::new(false),
            memory_budget,
            memory_used: AtomicUsize::new(0),
        }
    }

    /// Declares the suffix width new buckets will be created with. Existing
    /// buckets are unaffected; call before ingestion begins.
    pub fn initialize(&self, suffix_bits: u32) {
        self.suffix_bits.store(suffix_bits.max(1), Ordering::Relaxed);
    }

    /// Sets the per-bucket value width to `ceil(log2(max_value_hint+1))`;
    /// widens lazily on overflow regardless (see `PackedArray::push`).
    pub fn initialize_values(&self, max_value_hint: u64) {
        let width = bit_length(max_value_hint.saturating_add(1)).max(1);
        self.value_width.store(width, Ordering::Relaxed);
    }

    pub fn enable_multiset(&self, flag: bool) {
        self.multiset.store(flag, Ordering::Relaxed);
    }

    pub fn is_multiset(&self) -> bool {
        self.multiset.load(Ordering::Relaxed)
    }

    /// Appends `suffix` to bucket `prefix`'s suffix array with an implicit
    /// per-observation value of 1; pair with `add_value` only when a caller
    /// needs to override that default (e.g. loading a pre-counted source).
    pub fn add(&self, prefix: u64, suffix: u64) -> Result<()> {
        let suffix_bits = self.suffix_bits.load(Ordering::Relaxed);
        let value_width = self.value_width.load(Ordering::Relaxed);
        let mut entry =
            self.buckets.entry(prefix).or_insert_with(|| Bucket::new(suffix_bits, value_width));
        let before = entry.memory_bytes();
        entry.add(suffix, 1)?;
        let after = entry.memory_bytes();
        self.memory_used.fetch_add(after.saturating_sub(before), Ordering::Relaxed);
        Ok(())
    }

    /// Adds `v` to the value of the entry `add` most recently inserted for
    /// this prefix.
    pub fn add_value(&self, prefix: u64, v: u64) -> Result<()> {
        let mut entry = self.buckets.get_mut(&prefix).ok_or_else(|| {
            OrionKmerError::InvalidState(format!(
                "add_value called for prefix {prefix} with no prior add"
            ))
        })?;
        let before = entry.memory_bytes();
        entry.bump_last_value(v)?;
        let after = entry.memory_bytes();
        self.memory_used.fetch_add(after.saturating_sub(before), Ordering::Relaxed);
        Ok(())
    }

    /// Sorts bucket `prefix` by `(suffix, value)`, coalescing duplicate
    /// suffixes unless multiset mode is enabled. A no-op if the bucket does
    /// not exist or is already counted.
    pub fn count_kmers(&self, prefix: u64) -> Result<()> {
        if let Some(mut entry) = self.buckets.get_mut(&prefix) {
            let before = entry.memory_bytes();
            entry.count_kmers(self.is_multiset())?;
            let after = entry.memory_bytes();
            if after > before {
                self.memory_used.fetch_add(after - before, Ordering::Relaxed);
            } else {
                self.memory_used.fetch_sub(before - after, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Emits bucket `prefix`'s sorted data to `sink`, counting first if
    /// necessary.
    pub fn dump_counted_kmers(&self, prefix: u64, sink: &dyn BlockSink) -> Result<()> {
        self.count_kmers(prefix)?;
        if let Some(entry) = self.buckets.get(&prefix) {
            let entries = entry.iter()?;
            let suffix_bits = self.suffix_bits.load(Ordering::Relaxed);
            sink.write_block(prefix, suffix_bits, &entries)?;
        }
        Ok(())
    }

    /// Frees bucket `prefix`'s memory. A bucket absent from the map has
    /// already been drained; `DashMap::remove` is the sole drain path, so a
    /// bucket is never drained twice.
    pub fn remove_counted_kmers(&self, prefix: u64) {
        if let Some((_, bucket)) = self.buckets.remove(&prefix) {
            self.memory_used.fetch_sub(bucket.memory_bytes(), Ordering::Relaxed);
        }
    }

    pub fn memory_used(&self) -> usize {
        self.memory_used.load(Ordering::Relaxed)
    }

    pub fn prefixes(&self) -> Vec<u64> {
        self.buckets.iter().map(|e| *e.key()).collect()
    }

    /// Memory-discipline entry point: when usage exceeds the configured
    /// budget, drains the single largest bucket (count -> dump -> remove)
    /// through `sink` and reports whether a drain happened. Callers call this
    /// periodically from the ingestion loop rather than on every insertion.
    pub fn maybe_drain(&self, sink: &dyn BlockSink) -> Result<bool> {
        if self.memory_used.load(Ordering::Relaxed) <= self.memory_budget {
            return Ok(false);
        }
        let biggest =
            self.buckets.iter().max_by_key(|e| e.value().memory_bytes()).map(|e| *e.key());
        match biggest {
            Some(prefix) => {
                debug!("CountArray memory budget exceeded, draining prefix {prefix}");
                self.dump_counted_kmers(prefix, sink)?;
                self.remove_counted_kmers(prefix);
                Ok(true)
            }
            None => Err(OrionKmerError::OutOfMemory(
                "memory budget exceeded and no bucket is available to drain".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        blocks: Mutex<Vec<(u64, u32, Vec<(u64, u64)>)>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink { blocks: Mutex::new(Vec::new()) }
        }
    }

    impl BlockSink for RecordingSink {
        fn write_block(&self, prefix: u64, suffix_bits: u32, entries: &[(u64, u64)]) -> Result<()> {
            self.blocks.lock().unwrap().push((prefix, suffix_bits, entries.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn add_and_dump_produces_coalesced_block() {
        let arr = CountArray::new(usize::MAX);
        arr.initialize(8);
        for s in [5u64, 2, 5, 5, 1] {
            arr.add(3, s).unwrap();
        }
        let sink = RecordingSink::new();
        arr.dump_counted_kmers(3, &sink).unwrap();
        let blocks = sink.blocks.lock().unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0], (3, 8, vec![(1, 1), (2, 1), (5, 3)]));
    }

    #[test]
    fn add_value_requires_a_prior_add() {
        let arr = CountArray::new(usize::MAX);
        assert!(arr.add_value(9, 1).is_err());
    }

    #[test]
    fn remove_counted_kmers_frees_memory_and_is_a_noop_twice() {
        let arr = CountArray::new(usize::MAX);
        arr.add(1, 10).unwrap();
        assert!(arr.memory_used() > 0);
        arr.remove_counted_kmers(1);
        assert_eq!(arr.memory_used(), 0);
        arr.remove_counted_kmers(1); // already gone, no panic, no underflow
        assert_eq!(arr.memory_used(), 0);
    }

    #[test]
    fn maybe_drain_respects_budget() {
        let arr = CountArray::new(1); // tiny budget forces an immediate drain
        arr.add(1, 10).unwrap();
        let sink = RecordingSink::new();
        let drained = arr.maybe_drain(&sink).unwrap();
        assert!(drained);
        assert!(arr.prefixes().is_empty());
    }

    #[test]
    fn maybe_drain_is_noop_within_budget() {
        let arr = CountArray::new(usize::MAX);
        arr.add(1, 10).unwrap();
        let sink = RecordingSink::new();
        assert!(!arr.maybe_drain(&sink).unwrap());
        assert_eq!(arr.prefixes().len(), 1);
    }
}
