use super::packed_array::PackedArray;
use crate::errors::Result;

/// One prefix's worth of accumulated `(suffix, value)` pairs, each held in
/// its own bit-packed column. Insertion order is preserved until
/// `count_kmers` sorts and (in set mode) coalesces the bucket in place.
#[derive(Debug, Clone)]
pub struct Bucket {
    suffixes: PackedArray,
    values: PackedArray,
    counted: bool,
}

impl Bucket {
    pub fn new(suffix_width: u32, value_width: u32) -> Self {
        Bucket {
            suffixes: PackedArray::new(suffix_width),
            values: PackedArray::new(value_width),
            counted: false,
        }
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Appends one raw insertion: a suffix and its per-insertion value (1 for
    /// an ordinary count observation).
    pub fn add(&mut self, suffix: u64, value: u64) -> Result<()> {
        self.suffixes.push(suffix)?;
        self.values.push(value)?;
        self.counted = false;
        Ok(())
    }

    pub fn is_counted(&self) -> bool {
        self.counted
    }

    /// Adds `v` to the value of the most recently appended suffix. Mirrors
    /// `CountArray::add_value`'s contract of applying to whatever `add` just
    /// inserted.
    pub fn bump_last_value(&mut self, v: u64) -> Result<()> {
        if self.len() == 0 {
            return Err(crate::errors::OrionKmerError::InvalidState(
                "bump_last_value called on an empty bucket".into(),
            ));
        }
        let idx = self.len() - 1;
        let current = self.values.get(idx)?;
        self.values.set(idx, current + v)?;
        self.counted = false;
        Ok(())
    }

    /// Sorts by `(suffix, value)`; in set mode, coalesces equal suffixes by
    /// summing their values. Idempotent once the bucket has been counted.
    pub fn count_kmers(&mut self, multiset: bool) -> Result<()> {
        if self.counted {
            return Ok(());
        }
        let mut pairs: Vec<(u64, u64)> = (0..self.len())
            .map(|i| Ok((self.suffixes.get(i)?, self.values.get(i)?)))
            .collect::<Result<Vec<_>>>()?;
        pairs.sort_unstable();

        let merged: Vec<(u64, u64)> = if multiset {
            pairs
        } else {
            let mut out: Vec<(u64, u64)> = Vec::with_capacity(pairs.len());
            for (suffix, value) in pairs {
                match out.last_mut() {
                    Some((last_suffix, last_value)) if *last_suffix == suffix => {
                        *last_value += value;
                    }
                    _ => out.push((suffix, value)),
                }
            }
            out
        };

        let suffix_width = self.suffixes.width();
        let value_width = self.values.width();
        let mut new_suffixes = PackedArray::new(suffix_width);
        let mut new_values = PackedArray::new(value_width);
        for (suffix, value) in merged {
            new_suffixes.push(suffix)?;
            new_values.push(value)?;
        }
        self.suffixes = new_suffixes;
        self.values = new_values;
        self.counted = true;
        Ok(())
    }

    /// Iterates `(suffix, value)` pairs in their current (post-`count_kmers`,
    /// sorted) order.
    pub fn iter(&self) -> Result<Vec<(u64, u64)>> {
        (0..self.len()).map(|i| Ok((self.suffixes.get(i)?, self.values.get(i)?))).collect()
    }

    pub fn max_value(&self) -> Result<u64> {
        self.values.iter().try_fold(0u64, |max, v| Ok(max.max(v)))
    }

    pub fn memory_bytes(&self) -> usize {
        self.suffixes.byte_size() + self.values.byte_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_mode_coalesces_duplicate_suffixes() {
        let mut bucket = Bucket::new(8, 4);
        for s in [5u64, 2, 5, 5, 1] {
            bucket.add(s, 1).unwrap();
        }
        bucket.count_kmers(false).unwrap();
        assert_eq!(bucket.iter().unwrap(), vec![(1, 1), (2, 1), (5, 3)]);
    }

    #[test]
    fn multiset_mode_keeps_every_entry_sorted() {
        let mut bucket = Bucket::new(8, 4);
        for s in [5u64, 2, 5, 1] {
            bucket.add(s, 1).unwrap();
        }
        bucket.count_kmers(true).unwrap();
        assert_eq!(bucket.iter().unwrap(), vec![(1, 1), (2, 1), (5, 1), (5, 1)]);
    }

    #[test]
    fn count_kmers_is_idempotent() {
        let mut bucket = Bucket::new(8, 4);
        bucket.add(3, 1).unwrap();
        bucket.add(1, 1).unwrap();
        bucket.count_kmers(false).unwrap();
        let first = bucket.iter().unwrap();
        bucket.count_kmers(false).unwrap();
        assert_eq!(bucket.iter().unwrap(), first);
    }

    #[test]
    fn max_value_tracks_largest_entry() {
        let mut bucket = Bucket::new(8, 8);
        bucket.add(1, 3).unwrap();
        bucket.add(2, 9).unwrap();
        bucket.add(3, 4).unwrap();
        assert_eq!(bucket.max_value().unwrap(), 9);
    }
}
