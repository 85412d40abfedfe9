//! Per-prefix block encoding: an Elias-Fano suffix list plus a value column
//! encoded under whichever of three prefix-free codes is smallest.

use crate::bits::codes::{elias_gamma_bit_count, zeckendorf_bit_count};
use crate::bits::{BitStream, bit_length, ceil_log2, low_mask, safe_shl, safe_shr};
use crate::errors::{OrionKmerError, Result};

const MAGIC_HI: &[u8; 8] = b"merylDat";
const MAGIC_LO: &[u8; 8] = b"aFile00\n";

const SUFFIX_TAG_ELIAS_FANO: u64 = 1;
const VALUE_TAG_FIXED: u8 = 1;
const VALUE_TAG_ELIAS_GAMMA: u8 = 2;
const VALUE_TAG_ZECKENDORF: u8 = 3;

fn bytes_to_u64(b: &[u8; 8]) -> u64 {
    b.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64)
}

/// A block's decoded contents: one prefix's sorted `(suffix, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    pub prefix: u64,
    pub entries: Vec<(u64, u64)>,
}

/// Picks the value-column tag (and, for the fixed-width tag, the width) with
/// the smallest exact encoded size, without materializing any of the three
/// candidate encodings.
fn choose_best_tag(values: &[u64]) -> (u8, u32) {
    let max_value = values.iter().copied().max().unwrap_or(0);
    let fixed_width = bit_length(max_value).max(1);
    let fixed_bits: u64 = 8 + fixed_width as u64 * values.len() as u64;
    let gamma_bits: u64 = values.iter().map(|&v| elias_gamma_bit_count(v) as u64).sum();
    let zeckendorf_bits: u64 = values.iter().map(|&v| zeckendorf_bit_count(v) as u64).sum();

    if fixed_bits <= gamma_bits && fixed_bits <= zeckendorf_bits {
        (VALUE_TAG_FIXED, fixed_width)
    } else if gamma_bits <= zeckendorf_bits {
        (VALUE_TAG_ELIAS_GAMMA, 0)
    } else {
        (VALUE_TAG_ZECKENDORF, 0)
    }
}

/// Encodes one prefix's sorted `(suffix, value)` entries into a
/// self-contained block blob (header + suffix column + value column),
/// suitable for appending directly to a data file. Returns the encoded bytes;
/// the caller records the append offset and `bytes.len()` in its file index.
pub fn encode_block(
    prefix: u64,
    suffix_bits: u32,
    entries: &[(u64, u64)],
    explicit_value_tag: Option<u8>,
) -> Result<Vec<u8>> {
    if suffix_bits > 64 {
        return Err(OrionKmerError::InvalidInput(format!(
            "suffixBits {suffix_bits} exceeds the 64-bit suffix word limit"
        )));
    }
    let n = entries.len() as u64;
    let unary_bits = if n <= 1 { 0 } else { ceil_log2(n) };
    let binary_bits = suffix_bits.saturating_sub(unary_bits);

    let values: Vec<u64> = entries.iter().map(|&(_, v)| v).collect();
    let (value_tag, fixed_width) = match explicit_value_tag {
        Some(tag @ VALUE_TAG_FIXED) => (tag, bit_length(values.iter().copied().max().unwrap_or(0)).max(1)),
        Some(tag) => (tag, 0),
        None => choose_best_tag(&values),
    };

    let mut bs = BitStream::new();
    bs.put_bits(bytes_to_u64(MAGIC_HI), 64)?;
    bs.put_bits(bytes_to_u64(MAGIC_LO), 64)?;
    bs.put_bits(prefix, 64)?;
    bs.put_bits(n, 64)?;
    bs.put_bits(SUFFIX_TAG_ELIAS_FANO, 8)?;
    bs.put_bits(unary_bits as u64, 32)?;
    bs.put_bits(binary_bits as u64, 32)?;
    bs.put_bits(0, 64)?; // reserved
    bs.put_bits(value_tag as u64, 8)?;
    bs.put_bits(0, 64)?; // reserved
    bs.put_bits(0, 64)?; // reserved

    let mut prev_high = 0u64;
    for &(suffix, _) in entries {
        let high = safe_shr(suffix, binary_bits);
        bs.put_unary(high - prev_high)?;
        if binary_bits > 0 {
            let low = suffix & low_mask(binary_bits);
            bs.put_bits(low, binary_bits)?;
        }
        prev_high = high;
    }

    match value_tag {
        VALUE_TAG_FIXED => {
            bs.put_bits(fixed_width as u64, 8)?;
            for &v in &values {
                bs.put_bits(v, fixed_width)?;
            }
        }
        VALUE_TAG_ELIAS_GAMMA => {
            for &v in &values {
                bs.put_elias_gamma(v)?;
            }
        }
        VALUE_TAG_ZECKENDORF => {
            for &v in &values {
                bs.put_zeckendorf(v)?;
            }
        }
        other => {
            return Err(OrionKmerError::InvalidInput(format!("unknown value-column tag {other}")));
        }
    }

    bs.flush();
    Ok(bs.into_bytes())
}

/// Decodes a block previously produced by `encode_block`.
pub fn decode_block(bytes: &[u8]) -> Result<DecodedBlock> {
    let mut bs = BitStream::from_bytes(bytes.to_vec(), bytes.len() as u64 * 8);

    let magic_hi = bs.get_bits(64)?;
    let magic_lo = bs.get_bits(64)?;
    if magic_hi != bytes_to_u64(MAGIC_HI) || magic_lo != bytes_to_u64(MAGIC_LO) {
        return Err(OrionKmerError::CorruptBlock("block magic mismatch".into()));
    }
    let prefix = bs.get_bits(64)?;
    let n = bs.get_bits(64)?;
    let _suffix_tag = bs.get_bits(8)?;
    let unary_bits = bs.get_bits(32)? as u32;
    let binary_bits = bs.get_bits(32)? as u32;
    let _reserved0 = bs.get_bits(64)?;
    let value_tag = bs.get_bits(8)? as u8;
    let _reserved1 = bs.get_bits(64)?;
    let _reserved2 = bs.get_bits(64)?;
    let _ = unary_bits; // reconstructed implicitly via running high-bits sum below

    let mut suffixes = Vec::with_capacity(n as usize);
    let mut running_high = 0u64;
    for _ in 0..n {
        let delta = bs.get_unary()?;
        running_high += delta;
        let low = if binary_bits > 0 { bs.get_bits(binary_bits)? } else { 0 };
        let suffix = safe_shl(running_high, binary_bits) | low;
        suffixes.push(suffix);
    }

    let mut values = Vec::with_capacity(n as usize);
    match value_tag {
        VALUE_TAG_FIXED => {
            let width = bs.get_bits(8)? as u32;
            for _ in 0..n {
                values.push(bs.get_bits(width)?);
            }
        }
        VALUE_TAG_ELIAS_GAMMA => {
            for _ in 0..n {
                values.push(bs.get_elias_gamma()?);
            }
        }
        VALUE_TAG_ZECKENDORF => {
            for _ in 0..n {
                values.push(bs.get_zeckendorf()?);
            }
        }
        other => {
            return Err(OrionKmerError::CorruptBlock(format!("unknown value-column tag {other}")));
        }
    }

    let entries = suffixes.into_iter().zip(values).collect();
    Ok(DecodedBlock { prefix, entries })
}
