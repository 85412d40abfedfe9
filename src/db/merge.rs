//! N-way merge of multiple databases with a per-kmer reducer.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use super::reader::DatabaseReader;
use crate::count::BlockSink;
use crate::errors::{OrionKmerError, Result};
use crate::kmer::{Kmer, KmerParams};

/// The per-kmer combining operator applied across aligned source databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Min,
    Max,
    Subtract,
    And,
    Or,
    Xor,
}

struct HeapEntry {
    kmer_value: u128,
    kmer: Kmer,
    value: u32,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.kmer_value == other.kmer_value && self.source == other.source
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.kmer_value, self.source).cmp(&(other.kmer_value, other.source))
    }
}

/// Streams `M` opened `DatabaseReader`s in k-mer order and reduces aligned
/// values through a selected reducer, emitting the result through a
/// `BlockSink` (typically a `DatabaseWriter`).
pub struct MergeEngine<'a> {
    readers: Vec<&'a DatabaseReader>,
    reducer: Reducer,
    params: KmerParams,
}

impl<'a> MergeEngine<'a> {
    /// Validates that every reader agrees on `K`, the canonical flag and
    /// `prefixBits`, and rejects multiset-mode inputs: a reducer
    /// only ever sees one already-coalesced value per k-mer per source.
    pub fn open(readers: Vec<&'a DatabaseReader>, reducer: Reducer) -> Result<Self> {
        if readers.is_empty() {
            return Err(OrionKmerError::InvalidInput(
                "MergeEngine requires at least one input database".into(),
            ));
        }
        let params = *readers[0].params();
        for r in &readers {
            let p = r.params();
            if p.k() != params.k() || p.canonical() != params.canonical() || p.prefix_bits() != params.prefix_bits()
            {
                return Err(OrionKmerError::IncompatibleInputs(
                    "merge inputs disagree on K, canonical flag, or prefixBits".into(),
                ));
            }
            if r.stats().multiset {
                return Err(OrionKmerError::IncompatibleInputs(
                    "multiset-mode databases are not valid merge inputs".into(),
                ));
            }
        }
        Ok(MergeEngine { readers, reducer, params })
    }

    fn reduce(&self, values: &[Option<u64>]) -> Option<u64> {
        let present: Vec<u64> = values.iter().filter_map(|v| *v).collect();
        match self.reducer {
            Reducer::Sum | Reducer::Or => Some(present.iter().sum()),
            Reducer::Min => present.iter().copied().min(),
            Reducer::Max => present.iter().copied().max(),
            Reducer::Subtract => {
                let first = values[0]?;
                let rest: u64 = values[1..].iter().filter_map(|v| *v).sum();
                Some(first.saturating_sub(rest))
            }
            Reducer::And => {
                if present.len() == values.len() { Some(present.iter().sum()) } else { None }
            }
            Reducer::Xor => {
                if present.len() % 2 == 1 { Some(present.iter().sum()) } else { None }
            }
        }
    }

    /// Runs the merge to completion, writing every reduced entry through
    /// `sink` grouped one block per prefix.
    pub fn run(&self, sink: &dyn BlockSink) -> Result<()> {
        let mut iters: Vec<_> = self.readers.iter().map(|r| r.stream()).collect();
        let mut heap: BinaryHeap<Reverse<HeapEntry>> = BinaryHeap::new();

        for (idx, it) in iters.iter_mut().enumerate() {
            if let Some(item) = it.next() {
                let (kmer, value) = item?;
                heap.push(Reverse(HeapEntry { kmer_value: kmer.value(), kmer, value, source: idx }));
            }
        }

        let prefix_bits = self.params.prefix_bits();
        let suffix_bits = self.params.suffix_bits();
        let mut current_prefix: Option<u64> = None;
        let mut pending: Vec<(u64, u64)> = Vec::new();

        while let Some(Reverse(top)) = heap.pop() {
            let kmer = top.kmer;
            let mut values_by_source: Vec<Option<u64>> = vec![None; self.readers.len()];
            values_by_source[top.source] = Some(top.value as u64);
            if let Some(item) = iters[top.source].next() {
                let (k, v) = item?;
                heap.push(Reverse(HeapEntry { kmer_value: k.value(), kmer: k, value: v, source: top.source }));
            }
            while let Some(Reverse(next)) = heap.peek() {
                if next.kmer_value != kmer.value() {
                    break;
                }
                let Reverse(next) = heap.pop().unwrap();
                values_by_source[next.source] = Some(next.value as u64);
                if let Some(item) = iters[next.source].next() {
                    let (k, v) = item?;
                    heap.push(Reverse(HeapEntry { kmer_value: k.value(), kmer: k, value: v, source: next.source }));
                }
            }

            // A zero-valued SUBTRACT result means the k-mer nets out to absent;
            // counts are stored as non-negative multiplicities, so it is
            // dropped rather than persisted as a literal zero entry.
            if let Some(reduced) = self.reduce(&values_by_source).filter(|&v| v != 0) {
                let prefix = kmer.prefix(prefix_bits);
                let suffix = kmer.suffix(prefix_bits);
                if current_prefix != Some(prefix) {
                    Self::flush(sink, current_prefix, suffix_bits, &mut pending)?;
                    current_prefix = Some(prefix);
                }
                pending.push((suffix, reduced));
            }
        }
        Self::flush(sink, current_prefix, suffix_bits, &mut pending)
    }

    fn flush(
        sink: &dyn BlockSink,
        prefix: Option<u64>,
        suffix_bits: u32,
        pending: &mut Vec<(u64, u64)>,
    ) -> Result<()> {
        if let Some(p) = prefix {
            if !pending.is_empty() {
                sink.write_block(p, suffix_bits, pending)?;
                pending.clear();
            }
        }
        Ok(())
    }
}
