//! Output encoders.

pub mod tsv;
pub mod vcf;

use crate::align::haplotype::Haplotype;
use crate::error::Result;
use crate::region::ReferenceRegion;
use crate::variant::call::VariantCall;
use std::sync::Arc;

/// Variant sink capability set; implementations are selected by
/// configuration at startup.
pub trait VariantWriter {
    fn set_sample_name(&mut self, name: &str);
    fn set_reference_region(&mut self, region: &Arc<ReferenceRegion>);
    fn write_variant(&mut self, v: &VariantCall) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Haplotype sink; receives every accepted haplotype.
pub trait HaplotypeWriter {
    fn set_sample_name(&mut self, name: &str);
    fn set_reference_region(&mut self, region: &Arc<ReferenceRegion>);
    fn write_haplotype(&mut self, h: &Haplotype) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

pub use tsv::{TsvHaplotypeWriter, TsvVariantWriter};
pub use vcf::VcfVariantWriter;
