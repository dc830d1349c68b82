//! Packed k-mer representation.
//!
//! A k-mer is a little-endian array of 64-bit words holding 2-bit base
//! codes: the rightmost (most recently appended) base occupies the low bits
//! of `words[0]`. [`KmerUtil`] fixes k and carries the derived masks so the
//! shift operations stay branch-free; it is a pure value shared immutably
//! across the pipeline.

use crate::error::{KestrelError, Result};
use crate::kmer::base;
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Bits per packed word.
pub const WORD_SIZE: usize = 64;
/// Smallest supported k; anything shorter has no anchoring power.
pub const MIN_KMER_SIZE: usize = 4;
/// Largest supported k (word-limit of the packed representation).
pub const MAX_KMER_SIZE: usize = 256;

/// Bases carried per word.
const BASES_PER_WORD: usize = WORD_SIZE / 2;

/// Packed k-mer. Two inline words cover k ≤ 64 without heap traffic.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Kmer {
    words: SmallVec<[u64; 2]>,
}

impl Kmer {
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.words
    }
}

impl fmt::Debug for Kmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kmer({:x?})", self.words.as_slice())
    }
}

/// K-mer configuration: k, word count, top-word mask, and the minimizer
/// subword used to shard count maps.
#[derive(Debug, Clone)]
pub struct KmerUtil {
    k: usize,
    words: usize,
    top_mask: u64,
    minimizer_size: usize,
    minimizer_mask: u64,
}

impl KmerUtil {
    pub fn new(k: usize) -> Result<Self> {
        if !(MIN_KMER_SIZE..=MAX_KMER_SIZE).contains(&k) {
            return Err(KestrelError::InvalidKmerSize(k));
        }
        let words = k.div_ceil(BASES_PER_WORD);
        let top_bits = (2 * k) % WORD_SIZE;
        let top_mask = if top_bits == 0 {
            u64::MAX
        } else {
            (1u64 << top_bits) - 1
        };
        let minimizer_size = k.min(15);
        let minimizer_mask = (1u64 << (2 * minimizer_size)) - 1;
        Ok(KmerUtil {
            k,
            words,
            top_mask,
            minimizer_size,
            minimizer_mask,
        })
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        self.words
    }

    #[inline]
    pub fn minimizer_size(&self) -> usize {
        self.minimizer_size
    }

    #[inline]
    pub fn minimizer_mask(&self) -> u64 {
        self.minimizer_mask
    }

    /// All-A k-mer, the accumulator seed.
    #[inline]
    pub fn empty(&self) -> Kmer {
        Kmer {
            words: smallvec![0u64; self.words],
        }
    }

    /// Shift `code` in on the right: bases slide one position left, the
    /// leftmost base falls off.
    #[inline]
    pub fn append(&self, kmer: &mut Kmer, code: u8) {
        debug_assert!(code < 4);
        for w in (1..self.words).rev() {
            kmer.words[w] = (kmer.words[w] << 2) | (kmer.words[w - 1] >> (WORD_SIZE - 2));
        }
        kmer.words[0] = (kmer.words[0] << 2) | u64::from(code);
        let top = self.words - 1;
        kmer.words[top] &= self.top_mask;
    }

    /// Shift `code` in on the left: bases slide one position right, the
    /// rightmost base falls off.
    #[inline]
    pub fn prepend(&self, kmer: &mut Kmer, code: u8) {
        debug_assert!(code < 4);
        for w in 0..self.words - 1 {
            kmer.words[w] = (kmer.words[w] >> 2) | (kmer.words[w + 1] << (WORD_SIZE - 2));
        }
        kmer.words[self.words - 1] >>= 2;
        let pos = 2 * (self.k - 1);
        kmer.words[pos / WORD_SIZE] |= u64::from(code) << (pos % WORD_SIZE);
    }

    /// 2-bit code of the base at `i`, counted from the left (0 = oldest).
    #[inline]
    pub fn base_at(&self, kmer: &Kmer, i: usize) -> u8 {
        debug_assert!(i < self.k);
        let pos = 2 * (self.k - 1 - i);
        ((kmer.words[pos / WORD_SIZE] >> (pos % WORD_SIZE)) & 3) as u8
    }

    /// Reverse complement as a fresh k-mer.
    pub fn reverse_complement(&self, kmer: &Kmer) -> Kmer {
        let mut rc = self.empty();
        for i in (0..self.k).rev() {
            self.append(&mut rc, base::complement(self.base_at(kmer, i)));
        }
        rc
    }

    /// Pack a byte slice of exactly k canonical bases; `None` when any base
    /// is ambiguous or the length is wrong.
    pub fn from_bytes(&self, bytes: &[u8]) -> Option<Kmer> {
        if bytes.len() != self.k {
            return None;
        }
        let mut kmer = self.empty();
        for &b in bytes {
            let c = base::code(b);
            if c >= 4 {
                return None;
            }
            self.append(&mut kmer, c);
        }
        Some(kmer)
    }

    /// ASCII rendering, mostly for logs and tests.
    pub fn to_bytes(&self, kmer: &Kmer) -> Vec<u8> {
        (0..self.k)
            .map(|i| base::to_byte(self.base_at(kmer, i)))
            .collect()
    }

    pub fn to_string(&self, kmer: &Kmer) -> String {
        String::from_utf8(self.to_bytes(kmer)).expect("ACGT is valid UTF-8")
    }

    /// Minimizer-masked low word, used to pick a count-map shard.
    #[inline]
    pub fn shard_key(&self, kmer: &Kmer) -> u64 {
        kmer.words[0] & self.minimizer_mask
    }
}
