//! Error kinds shared by every core component.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrionKmerError {
    #[error("Invalid K-mer size: {0}. Must be between 1 and 64.")]
    InvalidKmerSize(u8),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("I/O error")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt data: {0}")]
    CorruptData(String),

    #[error("Corrupt block: {0}")]
    CorruptBlock(String),

    #[error("On-disk format version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Merge inputs are incompatible: {0}")]
    IncompatibleInputs(String),

    #[error("Invalid API usage: {0}")]
    InvalidState(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),
}

impl OrionKmerError {
    /// True for failures that indicate a broken invariant or environment
    /// problem rather than a simple usage mistake; the CLI maps these to a
    /// distinct exit code (2+) so scripts can tell the two apart without
    /// parsing stderr.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            OrionKmerError::CorruptData(_)
                | OrionKmerError::CorruptBlock(_)
                | OrionKmerError::OutOfMemory(_)
                | OrionKmerError::IoError(_)
                | OrionKmerError::VersionMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OrionKmerError>;
