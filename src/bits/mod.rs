//! Bit-level I/O: a growable, seekable bit buffer plus the prefix-free integer
//! codes the database format builds on (unary, Elias-Gamma, Elias-Delta,
//! Fibonacci/Zeckendorf).

pub(crate) mod codes;
mod stream;

pub use stream::BitStream;

/// Number of bits needed to represent `v` in binary (0 maps to 0, matching
/// `u64::BITS - v.leading_zeros()` with the zero case special-cased).
pub fn bit_length(v: u64) -> u32 {
    64 - v.leading_zeros()
}

/// `ceil(log2(n))`, defined as 0 for `n <= 1`.
pub fn ceil_log2(n: u64) -> u32 {
    if n <= 1 {
        0
    } else {
        bit_length(n - 1)
    }
}

pub(crate) fn low_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

pub(crate) fn safe_shr(v: u64, bits: u32) -> u64 {
    if bits >= 64 { 0 } else { v >> bits }
}

pub(crate) fn safe_shl(v: u64, bits: u32) -> u64 {
    if bits >= 64 { 0 } else { v << bits }
}
