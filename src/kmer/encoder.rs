use std::collections::VecDeque;

use super::{Kmer, KmerParams};
use crate::errors::{OrionKmerError, Result};

/// Optional features configured once at construction and held fixed for the
/// encoder's lifetime.
#[derive(Debug, Clone, Default)]
pub struct KmerEncoderConfig {
    /// Consecutive identical bases collapse to one before entering the
    /// rolling window.
    pub homopolymer_compression: bool,
    /// A binary template of length `K' >= K`; `true` marks a window position
    /// that contributes to the k-mer. Exactly `K` positions must be marked.
    /// `None` is equivalent to a template of `K` all-true positions.
    pub spaced_seed: Option<Vec<bool>>,
}

/// Rolling k-mer extractor: advances one base at a time, tracking the
/// forward, reverse-complement and canonical k-mer currently in the window.
pub struct KmerEncoder {
    params: KmerParams,
    config: KmerEncoderConfig,
    window_len: usize,
    selected: Vec<usize>,
    window: VecDeque<u8>,
    last_base_code: Option<u8>,
}

impl KmerEncoder {
    pub fn new(params: KmerParams, config: KmerEncoderConfig) -> Result<Self> {
        let k = params.k() as usize;
        let (window_len, selected) = match &config.spaced_seed {
            None => (k, (0..k).collect()),
            Some(template) => {
                if template.len() < k {
                    return Err(OrionKmerError::InvalidInput(format!(
                        "spaced seed template length {} is shorter than K={k}",
                        template.len()
                    )));
                }
                let selected: Vec<usize> =
                    template.iter().enumerate().filter(|(_, &set)| set).map(|(i, _)| i).collect();
                if selected.len() != k {
                    return Err(OrionKmerError::InvalidInput(format!(
                        "spaced seed template marks {} positions, expected K={k}",
                        selected.len()
                    )));
                }
                (template.len(), selected)
            }
        };
        Ok(KmerEncoder {
            params,
            config,
            window_len,
            selected,
            window: VecDeque::with_capacity(window_len),
            last_base_code: None,
        })
    }

    pub fn params(&self) -> &KmerParams {
        &self.params
    }

    /// Advances the rolling window by one symbol. A non-ACGT base resets the
    /// rolling state entirely (no k-mer ever crosses it); a repeated base
    /// under homopolymer compression leaves the window unchanged.
    pub fn add_base(&mut self, b: u8) {
        let code = match b.to_ascii_uppercase() {
            b'A' => 0b00u8,
            b'C' => 0b01,
            b'G' => 0b10,
            b'T' => 0b11,
            _ => {
                self.reset();
                return;
            }
        };
        if self.config.homopolymer_compression {
            if self.last_base_code == Some(code) {
                return;
            }
        }
        self.last_base_code = Some(code);
        self.window.push_back(code);
        if self.window.len() > self.window_len {
            self.window.pop_front();
        }
    }

    pub fn has_kmer(&self) -> bool {
        self.window.len() == self.window_len
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_base_code = None;
    }

    fn windowed_value(&self) -> u128 {
        let mut value: u128 = 0;
        for &idx in &self.selected {
            value = (value << 2) | self.window[idx] as u128;
        }
        value
    }

    pub fn forward(&self) -> Option<Kmer> {
        if !self.has_kmer() {
            return None;
        }
        Kmer::new(self.windowed_value(), self.params.k()).ok()
    }

    pub fn reverse(&self) -> Option<Kmer> {
        self.forward().map(|k| k.reverse_complement())
    }

    pub fn canonical(&self) -> Option<Kmer> {
        self.forward().map(|k| k.canonical())
    }
}
