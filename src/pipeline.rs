//! Per-sample driver: counts → profiles → active regions → variants.
//!
//! Regions are processed one at a time, each to completion, and variants
//! are emitted in region order. Cancellation is cooperative: the stop flag
//! is polled between regions, never mid-matrix. Per-region input errors
//! are logged and skipped; writer errors halt the run.

use crate::active::counters::DetectorCounters;
use crate::active::detector::{ActiveRegionDetector, DetectorParams};
use crate::align::builder::KmerAlignmentBuilder;
use crate::align::weight::AlignmentWeight;
use crate::counts::map::CountMap;
use crate::counts::profile::CountProfile;
use crate::error::Result;
use crate::kmer::KmerUtil;
use crate::region::ReferenceRegion;
use crate::variant::caller::{CallerParams, VariantCaller};
use crate::variant::filter::FilterChain;
use crate::writer::{HaplotypeWriter, VariantWriter};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub kmer_size: usize,
    pub count_reverse: bool,
    pub detector: DetectorParams,
    pub weights: AlignmentWeight,
    pub caller: CallerParams,
    pub trace_matrix: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub regions: usize,
    pub failed_regions: usize,
    pub active_regions: usize,
    pub wildtype_regions: usize,
    pub haplotypes: usize,
    pub variants: usize,
    pub counters: DetectorCounters,
}

pub struct Pipeline {
    config: PipelineConfig,
    kutil: KmerUtil,
    stop: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Pipeline> {
        let kutil = KmerUtil::new(config.kmer_size)?;
        config.detector.validate()?;
        Ok(Pipeline {
            config,
            kutil,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn kutil(&self) -> &KmerUtil {
        &self.kutil
    }

    /// Shared flag a driver can set to stop the run between regions.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Call every region of one sample. `tick` runs once per region, for
    /// progress reporting.
    pub fn run(
        &self,
        counts: &dyn CountMap,
        regions: &[Arc<ReferenceRegion>],
        filters: &FilterChain,
        variant_writer: &mut dyn VariantWriter,
        mut haplotype_writer: Option<&mut (dyn HaplotypeWriter + '_)>,
        mut tick: impl FnMut(),
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut detector = ActiveRegionDetector::new(
            self.config.detector.clone(),
            &self.config.weights,
            self.kutil.clone(),
        )?;
        // one builder per run: its column buffers grow monotonically and
        // are reused across regions
        let mut builder = KmerAlignmentBuilder::new(
            counts,
            self.config.weights,
            self.config.detector.max_aligner_state,
            self.config.detector.max_haplotypes,
            self.config.detector.max_repeat_count,
            self.config.count_reverse,
            self.config.trace_matrix,
        );

        for region in regions {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested; halting before region {}", region.name());
                break;
            }
            summary.regions += 1;
            variant_writer.set_reference_region(region);
            if let Some(hw) = haplotype_writer.as_deref_mut() {
                hw.set_reference_region(region);
            }

            let container = match CountProfile::build(region, counts, self.config.count_reverse)
                .and_then(|profile| detector.detect(region, &profile, &mut builder))
            {
                Ok(container) => container,
                Err(e) => {
                    warn!("region {} failed: {e}", region.name());
                    summary.failed_regions += 1;
                    tick();
                    continue;
                }
            };

            for found in &container.regions {
                if found.active_region.is_wildtype() {
                    summary.wildtype_regions += 1;
                    continue;
                }
                summary.active_regions += 1;
                let caller =
                    VariantCaller::new(Arc::clone(&found.active_region), self.config.caller);
                for haplotype in &found.haplotypes {
                    if let Some(hw) = haplotype_writer.as_deref_mut() {
                        hw.write_haplotype(haplotype)?;
                    }
                    summary.haplotypes += 1;
                    for call in caller.call(haplotype) {
                        if let Some(kept) = filters.apply(call) {
                            variant_writer.write_variant(&kept)?;
                            summary.variants += 1;
                        }
                    }
                }
            }
            tick();
        }

        variant_writer.flush()?;
        if let Some(hw) = haplotype_writer.as_deref_mut() {
            hw.flush()?;
        }
        summary.counters = detector.counters();
        info!(
            "processed {} region(s): {} active, {} variants, {} failed",
            summary.regions, summary.active_regions, summary.variants, summary.failed_regions
        );
        Ok(summary)
    }
}
