use crate::errors::{OrionKmerError, Result};

/// Parameters shared by every component that needs to know the shape of a
/// k-mer database: `K`, whether it stores canonical or forward-only k-mers,
/// and the prefix/file/block partitioning. Threaded explicitly through every
/// constructor that needs it rather than kept as global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerParams {
    k: u8,
    canonical: bool,
    files_bits: u32,
    blocks_bits: u32,
}

/// `filesBits` is fixed at 6 (64 data files per database)
pub const FILES_BITS: u32 = 6;

impl KmerParams {
    /// `blocks_bits` is chosen by the caller so blocks hold roughly
    /// 10^5..10^6 k-mers; validated here against the persistent-database
    /// layer's 64-bit suffix-word constraint (`2*K - prefixBits <= 64`).
    pub fn new(k: u8, canonical: bool, blocks_bits: u32) -> Result<Self> {
        if k == 0 || k > 64 {
            return Err(OrionKmerError::InvalidKmerSize(k));
        }
        let prefix_bits = FILES_BITS + blocks_bits;
        if prefix_bits > 2 * k as u32 {
            return Err(OrionKmerError::InvalidInput(format!(
                "prefixBits ({prefix_bits}) exceeds 2*K ({})",
                2 * k as u32
            )));
        }
        let suffix_bits = 2 * k as u32 - prefix_bits;
        if suffix_bits > 64 {
            return Err(OrionKmerError::InvalidInput(format!(
                "2*K - prefixBits ({suffix_bits}) exceeds the 64-bit suffix word limit; \
                 choose a larger blocksBits or a smaller K for the persistent database layer"
            )));
        }
        Ok(KmerParams { k, canonical, files_bits: FILES_BITS, blocks_bits })
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    pub fn canonical(&self) -> bool {
        self.canonical
    }

    pub fn files_bits(&self) -> u32 {
        self.files_bits
    }

    pub fn blocks_bits(&self) -> u32 {
        self.blocks_bits
    }

    pub fn prefix_bits(&self) -> u32 {
        self.files_bits + self.blocks_bits
    }

    pub fn suffix_bits(&self) -> u32 {
        2 * self.k as u32 - self.prefix_bits()
    }

    pub fn num_files(&self) -> u64 {
        1u64 << self.files_bits
    }

    pub fn num_prefixes(&self) -> u64 {
        1u64 << self.prefix_bits()
    }

    /// The data file index (`prefix >> blocksBits`) that owns a given prefix.
    pub fn file_for_prefix(&self, prefix: u64) -> u64 {
        prefix >> self.blocks_bits
    }
}
