//! Drives the aligner through the sample's k-mer space.
//!
//! Starting from an active region's anchor k-mer, repeatedly form the four
//! one-base extensions, keep those with sample support, feed the best one
//! to the aligner, and save the rest as branch points. Exhausted or
//! hopeless paths pop a saved state; the walk ends when the stack is empty.

use crate::active::detector::{ActiveRegion, RegionResolver};
use crate::align::aligner::{KmerAligner, SaveOutcome};
use crate::align::haplotype::Haplotype;
use crate::align::weight::AlignmentWeight;
use crate::counts::map::{depth, CountMap};
use crate::error::Result;
use crate::kmer::{base, Kmer};
use fxhash::FxHashSet;
use log::trace;
use smallvec::SmallVec;
use std::sync::Arc;

/// Floor on the extension-depth threshold. Keeps count-1 and count-2
/// sequencing-error k-mers from spawning branches at low coverage.
const MIN_CANDIDATE_DEPTH: u32 = 3;

pub struct KmerAlignmentBuilder<'a> {
    counts: &'a dyn CountMap,
    aligner: KmerAligner,
    count_reverse: bool,
    max_repeat_count: u32,
}

impl<'a> KmerAlignmentBuilder<'a> {
    pub fn new(
        counts: &'a dyn CountMap,
        weights: AlignmentWeight,
        max_states: usize,
        max_haplotypes: usize,
        max_repeat_count: u32,
        count_reverse: bool,
        trace_enabled: bool,
    ) -> KmerAlignmentBuilder<'a> {
        let kutil = counts.k_util().clone();
        KmerAlignmentBuilder {
            counts,
            aligner: KmerAligner::new(weights, kutil, max_states, max_haplotypes, trace_enabled),
            count_reverse,
            max_repeat_count,
        }
    }

    /// Reconstruct every supported haplotype over one active region.
    pub fn build(&mut self, region: &Arc<ActiveRegion>) -> Result<Vec<Haplotype>> {
        let kutil = self.counts.k_util().clone();
        let reversed = region.left_end();
        let anchor = if reversed {
            region.right_anchor()
        } else {
            region.left_anchor()
        };
        let Some(anchor) = anchor else {
            // regions open on one end always carry the opposite anchor
            return Ok(Vec::new());
        };

        self.aligner.init(region);
        let threshold = MIN_CANDIDATE_DEPTH.max(region.stats().min / 2);
        let mut cur = anchor.clone();
        let mut visited: FxHashSet<Kmer> = FxHashSet::default();
        visited.insert(cur.clone());
        let mut repeat: u32 = 0;

        loop {
            // the four one-base extensions with sample support
            let mut cands: SmallVec<[(u8, Kmer, u32); 4]> = SmallVec::new();
            for code in 0u8..4 {
                let mut next = cur.clone();
                if reversed {
                    kutil.prepend(&mut next, code);
                } else {
                    kutil.append(&mut next, code);
                }
                let d = depth(self.counts, &next, self.count_reverse);
                if d >= threshold {
                    cands.push((code, next, d));
                }
            }
            // best support first; base order breaks ties
            cands.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

            if cands.is_empty() {
                if !self.try_restore(&mut cur, &mut visited, &mut repeat)? {
                    break;
                }
                continue;
            }

            let mut it = cands.into_iter();
            let (code, next, _) = it.next().expect("non-empty candidates");
            for (alt_code, alt_kmer, alt_depth) in it {
                if self.aligner.save_state(
                    alt_kmer,
                    base::to_byte(alt_code),
                    alt_depth,
                    &visited,
                    repeat,
                ) == SaveOutcome::Rejected
                {
                    trace!("state stack refused branch on base {}", base::to_byte(alt_code) as char);
                }
            }

            cur = next;
            if !visited.insert(cur.clone()) {
                repeat += 1;
                if repeat > self.max_repeat_count {
                    trace!("k-mer revisit cap exceeded; abandoning path");
                    if !self.try_restore(&mut cur, &mut visited, &mut repeat)? {
                        break;
                    }
                    continue;
                }
            }

            let hint = self.aligner.add_base(base::to_byte(code))?;
            if !hint {
                self.aligner.harvest()?;
                if !self.try_restore(&mut cur, &mut visited, &mut repeat)? {
                    break;
                }
            }
        }

        self.aligner.take_haplotypes(self.counts, self.count_reverse)
    }

    /// Pop saved states until one is worth continuing; false when the
    /// stack ran dry.
    fn try_restore(
        &mut self,
        cur: &mut Kmer,
        visited: &mut FxHashSet<Kmer>,
        repeat: &mut u32,
    ) -> Result<bool> {
        loop {
            match self.aligner.restore_state()? {
                None => return Ok(false),
                Some(restored) => {
                    *cur = restored.kmer;
                    *visited = restored.visited;
                    *repeat = restored.repeat_count;
                    if !visited.insert(cur.clone()) {
                        *repeat += 1;
                        if *repeat > self.max_repeat_count {
                            trace!("restored branch re-enters a visited k-mer; skipping");
                            continue;
                        }
                    }
                    if restored.continue_hint {
                        return Ok(true);
                    }
                    self.aligner.harvest()?;
                }
            }
        }
    }
}

impl RegionResolver for KmerAlignmentBuilder<'_> {
    fn resolve(&mut self, region: &Arc<ActiveRegion>) -> Result<Vec<Haplotype>> {
        self.build(region)
    }
}
