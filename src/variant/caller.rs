//! Variant extraction from canonical alignments.

use crate::active::detector::ActiveRegion;
use crate::align::haplotype::{AlignKind, Haplotype};
use crate::kmer::base;
use crate::variant::call::{VariantCall, VariantKind};
use log::trace;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct CallerParams {
    /// Report positions against the region instead of the reference.
    pub relative_positions: bool,
    /// Emit variants that touch ambiguous bases.
    pub call_ambiguous_variant: bool,
}

impl Default for CallerParams {
    fn default() -> Self {
        CallerParams {
            relative_positions: false,
            call_ambiguous_variant: true,
        }
    }
}

/// Walks a haplotype's canonical alignment and emits variant records.
pub struct VariantCaller {
    active_region: Arc<ActiveRegion>,
    params: CallerParams,
}

impl VariantCaller {
    pub fn new(active_region: Arc<ActiveRegion>, params: CallerParams) -> VariantCaller {
        VariantCaller {
            active_region,
            params,
        }
    }

    /// Extract the variants of one haplotype, left to right.
    pub fn call(&self, haplotype: &Haplotype) -> Vec<VariantCall> {
        let region = &self.active_region;
        let seq = region.ref_region().sequence();
        let con = haplotype.consensus();
        let mut ref_index = region.start_kmer_index();
        let mut con_index = 0usize;
        let mut out = Vec::new();

        for &(kind, n) in haplotype.canonical_alignment() {
            let n = n as usize;
            match kind {
                AlignKind::Match => {
                    ref_index += n;
                    con_index += n;
                }
                AlignKind::Mismatch => {
                    for t in 0..n {
                        self.emit(
                            &mut out,
                            haplotype,
                            VariantKind::Snp,
                            ref_index + t,
                            &seq[ref_index + t..ref_index + t + 1],
                            &con[con_index + t..con_index + t + 1],
                        );
                    }
                    ref_index += n;
                    con_index += n;
                }
                AlignKind::Ins => {
                    if ref_index == 0 || con_index == 0 {
                        // no anchor base to the left of an open end
                        trace!("discarding insertion with no left anchor base");
                    } else {
                        self.emit(
                            &mut out,
                            haplotype,
                            VariantKind::Ins,
                            ref_index - 1,
                            &seq[ref_index - 1..ref_index],
                            &con[con_index - 1..con_index + n],
                        );
                    }
                    con_index += n;
                }
                AlignKind::Del => {
                    if ref_index == 0 || con_index == 0 {
                        trace!("discarding deletion with no left anchor base");
                    } else {
                        self.emit(
                            &mut out,
                            haplotype,
                            VariantKind::Del,
                            ref_index - 1,
                            &seq[ref_index - 1..ref_index + n],
                            &con[con_index - 1..con_index],
                        );
                    }
                    ref_index += n;
                }
            }
        }
        out
    }

    fn emit(
        &self,
        out: &mut Vec<VariantCall>,
        haplotype: &Haplotype,
        kind: VariantKind,
        region_index: usize,
        ref_bases: &[u8],
        alt_bases: &[u8],
    ) {
        let ref_region = self.active_region.ref_region();
        if ref_region.in_flank(region_index) {
            trace!("discarding {kind} at flank index {region_index}");
            return;
        }
        if !self.params.call_ambiguous_variant
            && ref_bases
                .iter()
                .chain(alt_bases.iter())
                .any(|&b| !base::is_canonical(b))
        {
            trace!("discarding {kind} touching ambiguous bases");
            return;
        }
        let position = if self.params.relative_positions {
            region_index as u64 + 1
        } else {
            ref_region.reference_position(region_index)
        };
        out.push(VariantCall {
            kind,
            region_index,
            position,
            ref_bases: ref_bases.to_vec(),
            alt_bases: alt_bases.to_vec(),
            depth: haplotype.stats().min,
            score: haplotype.score(),
            ref_region: Arc::clone(ref_region),
            active_region: Arc::clone(&self.active_region),
        });
    }
}
