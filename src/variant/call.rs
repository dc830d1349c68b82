//! Variant records.

use crate::active::detector::ActiveRegion;
use crate::region::ReferenceRegion;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Snp,
    Ins,
    Del,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VariantKind::Snp => "SNP",
            VariantKind::Ins => "INS",
            VariantKind::Del => "DEL",
        })
    }
}

/// One called difference between the reference and a haplotype.
///
/// `region_index` is the 0-based index (into the owning region's sequence)
/// of the first REF base; `position` is the 1-based coordinate actually
/// reported, either against the reference sequence or against the region
/// depending on caller configuration. Indels follow VCF convention: REF and
/// ALT both start with the base to the left of the event.
#[derive(Debug, Clone)]
pub struct VariantCall {
    pub kind: VariantKind,
    pub region_index: usize,
    pub position: u64,
    pub ref_bases: Vec<u8>,
    pub alt_bases: Vec<u8>,
    /// Minimum sample depth over the supporting haplotype's k-mers.
    pub depth: u32,
    /// Alignment score of the supporting haplotype.
    pub score: f32,
    pub ref_region: Arc<ReferenceRegion>,
    pub active_region: Arc<ActiveRegion>,
}

impl VariantCall {
    pub fn ref_str(&self) -> &str {
        std::str::from_utf8(&self.ref_bases).unwrap_or("?")
    }

    pub fn alt_str(&self) -> &str {
        std::str::from_utf8(&self.alt_bases).unwrap_or("?")
    }
}
