//! VCF 4.2 variant output.

use crate::error::Result;
use crate::region::ReferenceRegion;
use crate::variant::call::VariantCall;
use crate::writer::VariantWriter;
use std::io::Write;
use std::sync::Arc;

pub struct VcfVariantWriter<W: Write> {
    out: W,
    sample_name: String,
    header_written: bool,
}

impl<W: Write> VcfVariantWriter<W> {
    pub fn new(out: W) -> VcfVariantWriter<W> {
        VcfVariantWriter {
            out,
            sample_name: String::from("SAMPLE"),
            header_written: false,
        }
    }

    /// Recover the underlying sink, flushing nothing extra.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_header(&mut self) -> Result<()> {
        writeln!(self.out, "##fileformat=VCFv4.2")?;
        writeln!(
            self.out,
            "##source=kestrel {}",
            env!("CARGO_PKG_VERSION")
        )?;
        writeln!(
            self.out,
            "##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Minimum k-mer depth over the supporting haplotype\">"
        )?;
        writeln!(
            self.out,
            "##INFO=<ID=AS,Number=1,Type=Float,Description=\"Alignment score of the supporting haplotype\">"
        )?;
        writeln!(
            self.out,
            "##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">"
        )?;
        writeln!(
            self.out,
            "##FORMAT=<ID=DP,Number=1,Type=Integer,Description=\"K-mer depth\">"
        )?;
        writeln!(
            self.out,
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\t{}",
            self.sample_name
        )?;
        self.header_written = true;
        Ok(())
    }
}

impl<W: Write> VariantWriter for VcfVariantWriter<W> {
    fn set_sample_name(&mut self, name: &str) {
        self.sample_name = name.to_string();
    }

    fn set_reference_region(&mut self, _region: &Arc<ReferenceRegion>) {}

    fn write_variant(&mut self, v: &VariantCall) -> Result<()> {
        if !self.header_written {
            self.write_header()?;
        }
        writeln!(
            self.out,
            "{}\t{}\t.\t{}\t{}\t{:.0}\tPASS\tDP={};AS={:.1}\tGT:DP\t1:{}",
            v.ref_region.name(),
            v.position,
            v.ref_str(),
            v.alt_str(),
            v.score,
            v.depth,
            v.score,
            v.depth,
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
