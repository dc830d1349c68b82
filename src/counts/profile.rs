//! Per-position k-mer count vector over one reference region.

use crate::counts::map::CountMap;
use crate::error::{KestrelError, Result};
use crate::kmer::base;
use crate::region::ReferenceRegion;

/// `count[i]` is the sample depth of the reference k-mer starting at base
/// `i` of the region (forward count, plus the reverse-complement count when
/// requested). Windows touching an ambiguous reference base stay zero.
#[derive(Debug, Clone)]
pub struct CountProfile {
    counts: Vec<u32>,
    k: usize,
}

impl CountProfile {
    /// Build the profile in one left-to-right pass.
    ///
    /// Fails with [`KestrelError::KmerSizeExceedsRegion`] when the region is
    /// shorter than k.
    pub fn build(
        region: &ReferenceRegion,
        counts: &dyn CountMap,
        count_reverse: bool,
    ) -> Result<CountProfile> {
        let kutil = counts.k_util();
        let k = kutil.k();
        let seq = region.sequence();
        if seq.len() < k {
            return Err(KestrelError::KmerSizeExceedsRegion {
                k,
                len: seq.len(),
            });
        }

        let n_slots = seq.len() - k + 1;
        let mut out = vec![0u32; n_slots];

        let mut fwd = kutil.empty();
        let mut rev = kutil.empty();
        let mut loaded = 0usize;
        for (i, &b) in seq.iter().enumerate() {
            let code = base::code(b);
            if code >= 4 {
                // pending slots stay zero; reload k-1 bases before the
                // next count is produced
                loaded = 0;
                continue;
            }
            kutil.append(&mut fwd, code);
            if count_reverse {
                kutil.prepend(&mut rev, base::complement(code));
            }
            loaded += 1;
            if loaded >= k {
                let idx = i + 1 - k;
                let mut c = counts.get(&fwd);
                if count_reverse {
                    c = c.saturating_add(counts.get(&rev));
                }
                out[idx] = c;
            }
        }

        Ok(CountProfile { counts: out, k })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> u32 {
        self.counts[i]
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        &self.counts
    }
}
