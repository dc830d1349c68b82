//! Active-region detection.
//!
//! The detector walks a region's k-mer count profile looking for sharp
//! drops (the left edge of a variant's support collapse) and sharp rises
//! (the right edge, or a variant running into the left end of the
//! reference). A drop opens a rightward scan that ends where counts climb
//! back over a recovery threshold; a rise opens the mirrored leftward scan.
//! The recovery threshold either stays constant or decays exponentially
//! from the anchor count toward `expDecayMin` of it, so regions over
//! naturally declining read depth still close.
//!
//! Narrow count spikes caused by k-mers shared with other genomic loci look
//! like premature recoveries; the peak check reads ahead and skips them.

use crate::active::counters::DetectorCounters;
use crate::active::stats::{quantile, RegionStats};
use crate::align::haplotype::Haplotype;
use crate::align::weight::AlignmentWeight;
use crate::counts::CountProfile;
use crate::error::{KestrelError, Result};
use crate::kmer::{Kmer, KmerUtil};
use crate::region::ReferenceRegion;
use itertools::Itertools;
use log::{debug, trace};
use std::sync::Arc;

/// Detector tuning.
#[derive(Debug, Clone)]
pub struct DetectorParams {
    /// Floor on |Δcount| that may trigger a scan.
    pub minimum_difference: u32,
    /// Quantile of |Δcount| raising the floor when > 0.
    pub difference_quantile: f64,
    /// Reject regions that reach either end of the reference.
    pub anchor_both_ends: bool,
    /// Allow ambiguous reference bases inside a region.
    pub call_ambiguous_regions: bool,
    /// Lookahead for peak detection; 0 disables.
    pub peak_scan_length: usize,
    /// Region length cap = maxGapSize + factor · k.
    pub scan_limit_factor: f64,
    /// Lower asymptote of the recovery threshold, as a fraction of the
    /// anchor count; 1.0 switches to a constant threshold.
    pub exp_decay_min: f64,
    /// Proportion of the decay range left at k bases from the anchor.
    pub exp_decay_alpha: f64,
    /// Search for a sharp edge when decay never recovers.
    pub recover_right_anchor: bool,
    /// Emit no-variant regions covering the gaps between variant regions.
    pub emit_wildtype_regions: bool,
    /// Saved aligner states before eviction.
    pub max_aligner_state: usize,
    /// Haplotype cap per region.
    pub max_haplotypes: usize,
    /// Times a single k-mer may reappear on one consensus path.
    pub max_repeat_count: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        DetectorParams {
            minimum_difference: 5,
            difference_quantile: 0.90,
            anchor_both_ends: true,
            call_ambiguous_regions: true,
            peak_scan_length: 7,
            scan_limit_factor: 5.0,
            exp_decay_min: 0.55,
            exp_decay_alpha: 0.80,
            recover_right_anchor: true,
            emit_wildtype_regions: false,
            max_aligner_state: 10,
            max_haplotypes: 16,
            max_repeat_count: 0,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.difference_quantile) {
            return Err(KestrelError::Config(format!(
                "difference quantile {} not in [0, 1)",
                self.difference_quantile
            )));
        }
        if !(0.0..=1.0).contains(&self.exp_decay_min) {
            return Err(KestrelError::Config(format!(
                "exponential decay minimum {} not in [0, 1]",
                self.exp_decay_min
            )));
        }
        if !(self.exp_decay_alpha > 0.0 && self.exp_decay_alpha < 1.0) {
            return Err(KestrelError::Config(format!(
                "exponential decay alpha {} not in (0, 1)",
                self.exp_decay_alpha
            )));
        }
        if self.scan_limit_factor < 0.0 {
            return Err(KestrelError::Config(format!(
                "scan limit factor {} negative",
                self.scan_limit_factor
            )));
        }
        if self.max_aligner_state < 1 {
            return Err(KestrelError::Config(
                "max aligner state must be at least 1".into(),
            ));
        }
        if self.max_haplotypes < 1 {
            return Err(KestrelError::Config(
                "max haplotypes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/* ---------- active regions ------------------------------------------ */

/// One detected region: a `[start, end]` k-mer index range into the count
/// profile, its anchor k-mers, end flags, and count statistics.
#[derive(Debug, Clone)]
pub struct ActiveRegion {
    ref_region: Arc<ReferenceRegion>,
    start_kmer_index: usize,
    end_kmer_index: usize,
    k: usize,
    left_end: bool,
    right_end: bool,
    left_anchor: Option<Kmer>,
    right_anchor: Option<Kmer>,
    wildtype: bool,
    stats: RegionStats,
}

impl ActiveRegion {
    /// Build a region and its anchor k-mers. Returns `None` when a required
    /// anchor would contain an ambiguous base.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ref_region: &Arc<ReferenceRegion>,
        kutil: &KmerUtil,
        start_kmer_index: usize,
        end_kmer_index: usize,
        left_end: bool,
        right_end: bool,
        wildtype: bool,
        stats: RegionStats,
    ) -> Option<ActiveRegion> {
        debug_assert!(start_kmer_index <= end_kmer_index);
        debug_assert!(!(left_end && right_end));
        let k = kutil.k();
        let seq = ref_region.sequence();
        let left_anchor = if left_end {
            None
        } else {
            Some(kutil.from_bytes(&seq[start_kmer_index..start_kmer_index + k])?)
        };
        let right_anchor = if right_end {
            None
        } else {
            Some(kutil.from_bytes(&seq[end_kmer_index..end_kmer_index + k])?)
        };
        Some(ActiveRegion {
            ref_region: Arc::clone(ref_region),
            start_kmer_index,
            end_kmer_index,
            k,
            left_end,
            right_end,
            left_anchor,
            right_anchor,
            wildtype,
            stats,
        })
    }

    #[inline]
    pub fn ref_region(&self) -> &Arc<ReferenceRegion> {
        &self.ref_region
    }

    #[inline]
    pub fn start_kmer_index(&self) -> usize {
        self.start_kmer_index
    }

    #[inline]
    pub fn end_kmer_index(&self) -> usize {
        self.end_kmer_index
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn left_end(&self) -> bool {
        self.left_end
    }

    #[inline]
    pub fn right_end(&self) -> bool {
        self.right_end
    }

    #[inline]
    pub fn is_wildtype(&self) -> bool {
        self.wildtype
    }

    #[inline]
    pub fn left_anchor(&self) -> Option<&Kmer> {
        self.left_anchor.as_ref()
    }

    #[inline]
    pub fn right_anchor(&self) -> Option<&Kmer> {
        self.right_anchor.as_ref()
    }

    #[inline]
    pub fn stats(&self) -> &RegionStats {
        &self.stats
    }

    /// Reference bases spanned by the region's k-mers, `[start, end + k)`.
    #[inline]
    pub fn ref_slice(&self) -> &[u8] {
        &self.ref_region.sequence()[self.start_kmer_index..self.end_kmer_index + self.k]
    }

    /// Reference bases covered, in bases rather than k-mer slots.
    #[inline]
    pub fn base_len(&self) -> usize {
        self.end_kmer_index + self.k - self.start_kmer_index
    }
}

/// An accepted region with the haplotypes that justified it. Wildtype
/// regions carry no haplotypes.
#[derive(Debug)]
pub struct RegionHaplotypes {
    pub active_region: Arc<ActiveRegion>,
    pub haplotypes: Vec<Haplotype>,
}

/// Detector output for one reference region, sorted by start index.
#[derive(Debug)]
pub struct ActiveRegionContainer {
    pub ref_region: Arc<ReferenceRegion>,
    pub regions: Vec<RegionHaplotypes>,
}

impl ActiveRegionContainer {
    pub fn count(&self) -> usize {
        self.regions.len()
    }
}

/// Haplotype construction over a candidate region; implemented by the
/// aligner driver, stubbed in detector tests.
pub trait RegionResolver {
    fn resolve(&mut self, region: &Arc<ActiveRegion>) -> Result<Vec<Haplotype>>;
}

/* ---------- scan outcomes ------------------------------------------- */

enum RightScan {
    /// Recovery k-mer found at this index.
    Anchored(usize),
    /// No recovery; region may run to the right end.
    Open,
    Abandoned,
}

enum LeftScan {
    /// Sharp-edge recovery produced a left anchor at this index.
    Anchored(usize),
    /// Low counts all the way to the left end.
    OpenStart,
    Abandoned,
}

/* ---------- detector ------------------------------------------------ */

pub struct ActiveRegionDetector {
    params: DetectorParams,
    kutil: KmerUtil,
    scan_limit: usize,
    lambda: f64,
    counters: DetectorCounters,
}

impl ActiveRegionDetector {
    pub fn new(
        params: DetectorParams,
        weights: &AlignmentWeight,
        kutil: KmerUtil,
    ) -> Result<ActiveRegionDetector> {
        params.validate()?;
        let k = kutil.k();
        let raw = weights.max_gap_size(k) as f64 + params.scan_limit_factor * k as f64;
        let scan_limit = raw.min(i32::MAX as f64) as usize;
        let scan_limit = scan_limit.max(k);
        let lambda = -params.exp_decay_alpha.ln() / k as f64;
        Ok(ActiveRegionDetector {
            params,
            kutil,
            scan_limit,
            lambda,
            counters: DetectorCounters::default(),
        })
    }

    pub fn counters(&self) -> DetectorCounters {
        self.counters
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Scan one region's profile, resolving each candidate through
    /// `resolver`, and return the accepted regions sorted by start.
    pub fn detect(
        &mut self,
        ref_region: &Arc<ReferenceRegion>,
        profile: &CountProfile,
        resolver: &mut dyn RegionResolver,
    ) -> Result<ActiveRegionContainer> {
        let n = profile.len();
        let threshold = self.diff_threshold(profile);
        trace!(
            "region {}: {} k-mer slots, diff threshold {:.2}, scan limit {}",
            ref_region.name(),
            n,
            threshold,
            self.scan_limit
        );

        let mut regions: Vec<RegionHaplotypes> = Vec::new();
        let mut last_region_end: isize = -1;
        let mut i = 1usize;
        while i < n {
            let count_l = profile.get(i - 1);
            let count_r = profile.get(i);
            let d = f64::from(count_l) - f64::from(count_r);

            if d > threshold && i as isize - 1 > last_region_end {
                self.counters.right_scans += 1;
                match self.right_scan(profile, i, f64::from(count_l), threshold) {
                    RightScan::Anchored(j) => {
                        if let Some(found) = self.try_accept(
                            ref_region, profile, resolver, i - 1, j, false, false,
                        )? {
                            last_region_end = found.active_region.end_kmer_index() as isize;
                            regions.push(found);
                            i = j + 1;
                            continue;
                        }
                    }
                    RightScan::Open => {
                        if let Some(found) = self.try_accept(
                            ref_region, profile, resolver, i - 1, n - 1, false, true,
                        )? {
                            last_region_end = found.active_region.end_kmer_index() as isize;
                            regions.push(found);
                            break;
                        }
                    }
                    RightScan::Abandoned => {}
                }
            } else if d < -threshold {
                self.counters.left_scans += 1;
                match self.left_scan(profile, i, f64::from(count_r), threshold, last_region_end) {
                    LeftScan::Anchored(start) => {
                        if let Some(found) = self.try_accept(
                            ref_region, profile, resolver, start, i, false, false,
                        )? {
                            last_region_end = found.active_region.end_kmer_index() as isize;
                            regions.push(found);
                        }
                    }
                    LeftScan::OpenStart => {
                        if let Some(found) = self.try_accept(
                            ref_region, profile, resolver, 0, i, true, false,
                        )? {
                            last_region_end = found.active_region.end_kmer_index() as isize;
                            regions.push(found);
                        }
                    }
                    LeftScan::Abandoned => {}
                }
            }
            i += 1;
        }

        if self.params.emit_wildtype_regions {
            self.fill_wildtype(ref_region, profile, &mut regions);
            regions.sort_by_key(|r| r.active_region.start_kmer_index());
        }

        debug!(
            "region {}: {} active region(s), counters {:?}",
            ref_region.name(),
            regions.len(),
            self.counters
        );
        Ok(ActiveRegionContainer {
            ref_region: Arc::clone(ref_region),
            regions,
        })
    }

    /* ---- thresholds ---- */

    /// Effective |Δcount| threshold; scans compare with strict `>`.
    fn diff_threshold(&self, profile: &CountProfile) -> f64 {
        let floor = f64::from(self.params.minimum_difference);
        let n = profile.len();
        if self.params.difference_quantile <= 0.0 || n < 2 {
            return floor - 1.0;
        }
        let deltas: Vec<u32> = (1..n)
            .map(|i| profile.get(i).abs_diff(profile.get(i - 1)))
            .sorted_unstable()
            .collect();
        let qv = quantile(&deltas, self.params.difference_quantile);
        floor.max(qv) - 1.0
    }

    /// Count value at which a scan considers support recovered, `dist`
    /// k-mers away from an anchor of count `anchor`.
    fn recovery_value(&self, anchor: f64, dist: usize, threshold: f64) -> f64 {
        if self.params.exp_decay_min >= 1.0 {
            (anchor - threshold).max(1.0)
        } else {
            let span = anchor - anchor * self.params.exp_decay_min;
            let floor = (anchor * self.params.exp_decay_min).max(1.0);
            floor + span * (-(dist as f64) * self.lambda).exp()
        }
    }

    /* ---- scans ---- */

    fn right_scan(
        &mut self,
        profile: &CountProfile,
        i: usize,
        count_l: f64,
        threshold: f64,
    ) -> RightScan {
        let n = profile.len();
        let k = self.kutil.k();
        let mut j = i + 1;
        let mut peaks = 0usize;
        let mut first_peak = 0usize;
        let mut last_peak = 0usize;
        let mut low_run = 0usize;
        let mut last_valley: Option<usize> = None;

        loop {
            if j >= n {
                return self.right_open_fallback(profile, i, threshold);
            }
            if j > i + self.scan_limit {
                trace!("right scan from {} passed limit {}", i, self.scan_limit);
                self.counters.abandoned += 1;
                return RightScan::Abandoned;
            }
            let rv = self.recovery_value(count_l, j - i, threshold);
            if f64::from(profile.get(j)) < rv {
                low_run += 1;
                if low_run >= k {
                    last_valley = Some(j);
                }
                j += 1;
                continue;
            }

            // candidate recovery; peek ahead for a narrow peak
            if self.params.peak_scan_length > 0 && j + 1 < n {
                let peek_end = (j + self.params.peak_scan_length).min(n - 1);
                let fell = ((j + 1)..=peek_end)
                    .find(|&p| f64::from(profile.get(p)) < self.recovery_value(count_l, p - i, threshold));
                if let Some(p) = fell {
                    peaks += 1;
                    if peaks == 1 {
                        first_peak = j;
                    }
                    last_peak = j;
                    self.counters.peaks_skipped += 1;
                    if peaks > 3 && last_peak - first_peak < k * (peaks - 1) {
                        // homology clutter; close at the last valley if any
                        return match last_valley {
                            Some(v) => {
                                trace!("right scan from {} fell back to valley {}", i, v);
                                RightScan::Anchored(v)
                            }
                            None => {
                                self.counters.abandoned += 1;
                                RightScan::Abandoned
                            }
                        };
                    }
                    low_run = 0;
                    j = p;
                    continue;
                }
            }
            return RightScan::Anchored(j);
        }
    }

    /// The decay never recovered before the profile ran out: look for a
    /// sharp rising edge as the right anchor, else fall back to an
    /// end-open region.
    fn right_open_fallback(&mut self, profile: &CountProfile, i: usize, threshold: f64) -> RightScan {
        let n = profile.len();
        let k = self.kutil.k();
        if self.params.recover_right_anchor {
            for jj in (i + k).max(1)..n {
                if f64::from(profile.get(jj)) - f64::from(profile.get(jj - 1)) > threshold {
                    trace!("right scan from {} recovered anchor at rising edge {}", i, jj);
                    return RightScan::Anchored(jj);
                }
            }
        }
        if self.params.anchor_both_ends {
            self.counters.abandoned += 1;
            RightScan::Abandoned
        } else {
            RightScan::Open
        }
    }

    fn left_scan(
        &mut self,
        profile: &CountProfile,
        i: usize,
        count_r: f64,
        threshold: f64,
        last_region_end: isize,
    ) -> LeftScan {
        let n = profile.len();
        let k = self.kutil.k();

        // a rise that collapses again within the lookahead is a peak, not
        // the right edge of a left-end region
        if self.params.peak_scan_length > 0 && i + 1 < n {
            let peek_end = (i + self.params.peak_scan_length).min(n - 1);
            for p in (i + 1)..=peek_end {
                if f64::from(profile.get(p)) < self.recovery_value(count_r, p - i, threshold) {
                    self.counters.peaks_skipped += 1;
                    return LeftScan::Abandoned;
                }
            }
        }

        let mut j = i as isize - 1;
        loop {
            if j < 0 {
                return if self.params.anchor_both_ends {
                    self.counters.abandoned += 1;
                    LeftScan::Abandoned
                } else {
                    LeftScan::OpenStart
                };
            }
            if j <= last_region_end {
                // cannot overrun the previous region
                self.counters.abandoned += 1;
                return LeftScan::Abandoned;
            }
            let dist = (i as isize - j) as usize;
            if dist > self.scan_limit {
                return self.left_anchor_recovery(profile, i, threshold, last_region_end);
            }
            if f64::from(profile.get(j as usize)) < self.recovery_value(count_r, dist, threshold) {
                j -= 1;
                continue;
            }
            // counts recovered before the left end: interior regions are
            // produced by right scans
            self.counters.abandoned += 1;
            return LeftScan::Abandoned;
        }
    }

    /// Mirror of the right-anchor recovery: search leftward for a sharp
    /// falling edge to serve as the left anchor.
    fn left_anchor_recovery(
        &mut self,
        profile: &CountProfile,
        i: usize,
        threshold: f64,
        last_region_end: isize,
    ) -> LeftScan {
        if self.params.recover_right_anchor && i > self.kutil.k() {
            let mut jj = i as isize - self.kutil.k() as isize;
            while jj > last_region_end && jj >= 0 {
                let u = jj as usize;
                if f64::from(profile.get(u)) - f64::from(profile.get(u + 1)) > threshold {
                    trace!("left scan to {} recovered anchor at falling edge {}", i, u);
                    return LeftScan::Anchored(u);
                }
                jj -= 1;
            }
        }
        self.counters.abandoned += 1;
        LeftScan::Abandoned
    }

    /* ---- acceptance ---- */

    #[allow(clippy::too_many_arguments)]
    fn try_accept(
        &mut self,
        ref_region: &Arc<ReferenceRegion>,
        profile: &CountProfile,
        resolver: &mut dyn RegionResolver,
        start: usize,
        end: usize,
        left_end: bool,
        right_end: bool,
    ) -> Result<Option<RegionHaplotypes>> {
        let k = self.kutil.k();
        if !left_end && !right_end && end - start < k {
            trace!("candidate [{start}, {end}] too short");
            self.counters.rejected_short += 1;
            return Ok(None);
        }
        if !self.params.call_ambiguous_regions
            && ref_region.has_ambiguous(start, end + k)
        {
            trace!("candidate [{start}, {end}] crosses ambiguous bases");
            self.counters.rejected_ambiguous += 1;
            return Ok(None);
        }
        let stats = RegionStats::from_counts(&profile.as_slice()[start..=end]);
        let region = match ActiveRegion::new(
            ref_region, &self.kutil, start, end, left_end, right_end, false, stats,
        ) {
            Some(r) => Arc::new(r),
            None => {
                trace!("candidate [{start}, {end}] has an ambiguous anchor");
                self.counters.rejected_anchor += 1;
                return Ok(None);
            }
        };
        let haplotypes = resolver.resolve(&region)?;
        if haplotypes.is_empty() || haplotypes.iter().all(|h| h.is_wildtype()) {
            trace!("candidate [{start}, {end}] aligned to wildtype only");
            self.counters.rejected_wildtype += 1;
            return Ok(None);
        }
        debug!(
            "accepted region [{start}, {end}] with {} haplotype(s)",
            haplotypes.len()
        );
        self.counters.accepted += 1;
        Ok(Some(RegionHaplotypes {
            active_region: region,
            haplotypes,
        }))
    }

    /// Cover inter-region gaps with wildtype regions so downstream
    /// consumers can fill gVCF blocks. Gaps shorter than k−1 are dropped.
    fn fill_wildtype(
        &mut self,
        ref_region: &Arc<ReferenceRegion>,
        profile: &CountProfile,
        regions: &mut Vec<RegionHaplotypes>,
    ) {
        let n = profile.len();
        let k = self.kutil.k();
        let mut gaps: Vec<(usize, usize)> = Vec::new();
        let mut cursor = 0usize;
        for r in regions.iter() {
            let s = r.active_region.start_kmer_index();
            if s > cursor {
                gaps.push((cursor, s - 1));
            }
            cursor = r.active_region.end_kmer_index() + 1;
        }
        if cursor < n {
            gaps.push((cursor, n - 1));
        }
        for (s, e) in gaps {
            if e + 1 - s < k - 1 {
                continue;
            }
            let stats = RegionStats::from_counts(&profile.as_slice()[s..=e]);
            if let Some(region) = ActiveRegion::new(
                ref_region, &self.kutil, s, e, false, false, true, stats,
            ) {
                self.counters.wildtype_emitted += 1;
                regions.push(RegionHaplotypes {
                    active_region: Arc::new(region),
                    haplotypes: Vec::new(),
                });
            }
        }
    }
}
