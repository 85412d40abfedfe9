//! Elias-Gamma, Elias-Delta and Fibonacci (Zeckendorf) prefix-free codes for
//! positive integers, layered on top of [`BitStream`](super::BitStream).

use std::sync::OnceLock;

use super::{BitStream, bit_length};
use crate::errors::{OrionKmerError, Result};

fn require_positive(n: u64) -> Result<()> {
    if n == 0 {
        Err(OrionKmerError::InvalidInput(
            "Elias/Fibonacci codes require n >= 1".into(),
        ))
    } else {
        Ok(())
    }
}

impl BitStream {
    /// Elias-Gamma: `n >= 1`. Writes `bitlen(n) - 1` zero bits, the implicit
    /// leading 1 (as the unary terminator), then the remaining `bitlen(n) -
    /// 1` low bits of `n`.
    pub fn put_elias_gamma(&mut self, n: u64) -> Result<()> {
        require_positive(n)?;
        let bits = bit_length(n);
        self.put_unary((bits - 1) as u64)?;
        if bits > 1 {
            let low = n & ((1u64 << (bits - 1)) - 1);
            self.put_bits(low, bits - 1)?;
        }
        Ok(())
    }

    pub fn get_elias_gamma(&mut self) -> Result<u64> {
        let cnt = self.get_unary()?;
        if cnt == 0 {
            return Ok(1);
        }
        if cnt >= 64 {
            return Err(OrionKmerError::CorruptData(
                "Elias-Gamma code implies an integer wider than 64 bits".into(),
            ));
        }
        let low = self.get_bits(cnt as u32)?;
        Ok((1u64 << cnt) | low)
    }

    /// Elias-Delta: `n >= 1`. Writes `gamma(bitlen(n))` followed by the
    /// remaining `bitlen(n) - 1` low bits of `n`. More compact than gamma for
    /// large n, at the cost of a slightly larger constant for small n.
    pub fn put_elias_delta(&mut self, n: u64) -> Result<()> {
        require_positive(n)?;
        let bits = bit_length(n);
        self.put_elias_gamma(bits as u64)?;
        if bits > 1 {
            let low = n & ((1u64 << (bits - 1)) - 1);
            self.put_bits(low, bits - 1)?;
        }
        Ok(())
    }

    pub fn get_elias_delta(&mut self) -> Result<u64> {
        let bits = self.get_elias_gamma()?;
        if bits == 0 || bits >= 64 {
            return Err(OrionKmerError::CorruptData(
                "Elias-Delta code decoded an impossible bit length".into(),
            ));
        }
        if bits == 1 {
            return Ok(1);
        }
        let low = self.get_bits((bits - 1) as u32)?;
        Ok((1u64 << (bits - 1)) | low)
    }

    /// Fibonacci (Zeckendorf): `n >= 1`. Every positive integer has a unique
    /// representation as a sum of non-consecutive Fibonacci numbers
    /// (F(2)=1, F(3)=2, F(4)=3, F(5)=5, ...); the code is that
    /// representation's bits, low Fibonacci index first, terminated by an
    /// extra `1` bit (so the code always ends in two consecutive `1`s, and
    /// nowhere else, since consecutive terms are never both used).
    pub fn put_zeckendorf(&mut self, n: u64) -> Result<()> {
        require_positive(n)?;
        let table = fibonacci_table();
        let hi = match table.binary_search(&n) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let mut digits = vec![false; hi + 1];
        let mut remaining = n;
        let mut i = hi as isize;
        while i >= 0 {
            let idx = i as usize;
            if table[idx] <= remaining {
                digits[idx] = true;
                remaining -= table[idx];
                i -= 2; // no two consecutive Fibonacci numbers are ever used
            } else {
                i -= 1;
            }
        }
        debug_assert_eq!(remaining, 0);
        for &d in &digits {
            self.put_bits(d as u64, 1)?;
        }
        self.put_bits(1, 1) // terminator
    }

    pub fn get_zeckendorf(&mut self) -> Result<u64> {
        let table = fibonacci_table();
        let mut value = 0u64;
        let mut idx = 0usize;
        let mut prev_bit = false;
        loop {
            let bit = self.get_bits(1)? == 1;
            if bit && prev_bit {
                return Ok(value); // two consecutive 1s: this bit is the terminator
            }
            if bit {
                if idx >= table.len() {
                    return Err(OrionKmerError::CorruptData(
                        "Fibonacci code did not terminate within a representable range".into(),
                    ));
                }
                value += table[idx];
            }
            prev_bit = bit;
            idx += 1;
        }
    }
}

/// Fibonacci numbers F(2)=1, F(3)=2, F(4)=3, ... up to the largest term that
/// still fits comfortably below `u64::MAX`, used for Zeckendorf encoding of
/// any `u64` value.
fn fibonacci_table() -> &'static [u64] {
    static TABLE: OnceLock<Vec<u64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut v = vec![1u64, 2u64];
        loop {
            let next = v[v.len() - 1] + v[v.len() - 2];
            if next > u64::MAX / 2 {
                break;
            }
            v.push(next);
        }
        v
    })
}

/// Exact encoded bit length of `n` under each code, used by the block writer
/// to pick the smallest value-column encoding without materializing it.
pub fn elias_gamma_bit_count(n: u64) -> u32 {
    2 * bit_length(n) - 1
}

pub fn elias_delta_bit_count(n: u64) -> u32 {
    let bits = bit_length(n);
    elias_gamma_bit_count(bits as u64) + bits.saturating_sub(1)
}

pub fn zeckendorf_bit_count(n: u64) -> u32 {
    let table = fibonacci_table();
    let hi = match table.binary_search(&n.max(1)) {
        Ok(i) => i,
        Err(i) => i - 1,
    };
    (hi as u32) + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_gamma(n: u64) {
        let mut bs = BitStream::new();
        bs.put_elias_gamma(n).unwrap();
        bs.flush();
        let mut bs = BitStream::from_bytes(bs.into_bytes(), bs.bit_len());
        assert_eq!(bs.get_elias_gamma().unwrap(), n);
    }

    fn roundtrip_delta(n: u64) {
        let mut bs = BitStream::new();
        bs.put_elias_delta(n).unwrap();
        bs.flush();
        let mut bs = BitStream::from_bytes(bs.into_bytes(), bs.bit_len());
        assert_eq!(bs.get_elias_delta().unwrap(), n);
    }

    fn roundtrip_zeckendorf(n: u64) {
        let mut bs = BitStream::new();
        bs.put_zeckendorf(n).unwrap();
        bs.flush();
        let mut bs = BitStream::from_bytes(bs.into_bytes(), bs.bit_len());
        assert_eq!(bs.get_zeckendorf().unwrap(), n, "zeckendorf roundtrip failed for n={n}");
    }

    #[test]
    fn gamma_roundtrip_small_and_large() {
        for n in [1u64, 2, 3, 4, 5, 17, 255, 256, 1_000_000, u32::MAX as u64] {
            roundtrip_gamma(n);
        }
    }

    #[test]
    fn delta_roundtrip_small_and_large() {
        for n in [1u64, 2, 3, 4, 5, 17, 255, 256, 1_000_000, u32::MAX as u64] {
            roundtrip_delta(n);
        }
    }

    #[test]
    fn zeckendorf_roundtrip_small_and_large() {
        for n in 1u64..200 {
            roundtrip_zeckendorf(n);
        }
        for n in [1_000u64, 1_000_000, u32::MAX as u64, u64::MAX / 4] {
            roundtrip_zeckendorf(n);
        }
    }

    #[test]
    fn zero_is_rejected_by_all_three_codes() {
        let mut bs = BitStream::new();
        assert!(bs.put_elias_gamma(0).is_err());
        assert!(bs.put_elias_delta(0).is_err());
        assert!(bs.put_zeckendorf(0).is_err());
    }

    #[test]
    fn sequential_codes_stay_self_delimiting() {
        let mut bs = BitStream::new();
        bs.put_elias_gamma(5).unwrap();
        bs.put_zeckendorf(12).unwrap();
        bs.put_elias_delta(900).unwrap();
        bs.flush();
        let mut bs = BitStream::from_bytes(bs.into_bytes(), bs.bit_len());
        assert_eq!(bs.get_elias_gamma().unwrap(), 5);
        assert_eq!(bs.get_zeckendorf().unwrap(), 12);
        assert_eq!(bs.get_elias_delta().unwrap(), 900);
    }

    #[test]
    fn bit_count_helpers_match_actual_encoded_length() {
        for n in [1u64, 2, 7, 8, 1000, 1_000_000] {
            let mut bs = BitStream::new();
            bs.put_elias_gamma(n).unwrap();
            assert_eq!(bs.bit_len(), elias_gamma_bit_count(n) as u64);

            let mut bs = BitStream::new();
            bs.put_elias_delta(n).unwrap();
            assert_eq!(bs.bit_len(), elias_delta_bit_count(n) as u64);

            let mut bs = BitStream::new();
            bs.put_zeckendorf(n).unwrap();
            assert_eq!(bs.bit_len(), zeckendorf_bit_count(n) as u64);
        }
    }
}
