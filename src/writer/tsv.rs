//! Tab-separated variant and haplotype output.

use crate::align::haplotype::Haplotype;
use crate::error::Result;
use crate::region::ReferenceRegion;
use crate::variant::call::VariantCall;
use crate::writer::{HaplotypeWriter, VariantWriter};
use std::io::Write;
use std::sync::Arc;

pub struct TsvVariantWriter<W: Write> {
    out: W,
    sample_name: String,
    header_written: bool,
}

impl<W: Write> TsvVariantWriter<W> {
    pub fn new(out: W) -> TsvVariantWriter<W> {
        TsvVariantWriter {
            out,
            sample_name: String::from("SAMPLE"),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> VariantWriter for TsvVariantWriter<W> {
    fn set_sample_name(&mut self, name: &str) {
        self.sample_name = name.to_string();
    }

    fn set_reference_region(&mut self, _region: &Arc<ReferenceRegion>) {}

    fn write_variant(&mut self, v: &VariantCall) -> Result<()> {
        if !self.header_written {
            writeln!(
                self.out,
                "sample\tchrom\tpos\ttype\tref\talt\tdepth\tscore"
            )?;
            self.header_written = true;
        }
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}",
            self.sample_name,
            v.ref_region.name(),
            v.position,
            v.kind,
            v.ref_str(),
            v.alt_str(),
            v.depth,
            v.score,
        )?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

pub struct TsvHaplotypeWriter<W: Write> {
    out: W,
    sample_name: String,
    header_written: bool,
}

impl<W: Write> TsvHaplotypeWriter<W> {
    pub fn new(out: W) -> TsvHaplotypeWriter<W> {
        TsvHaplotypeWriter {
            out,
            sample_name: String::from("SAMPLE"),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> HaplotypeWriter for TsvHaplotypeWriter<W> {
    fn set_sample_name(&mut self, name: &str) {
        self.sample_name = name.to_string();
    }

    fn set_reference_region(&mut self, _region: &Arc<ReferenceRegion>) {}

    fn write_haplotype(&mut self, h: &Haplotype) -> Result<()> {
        if !self.header_written {
            writeln!(
                self.out,
                "sample\tchrom\tregion_start\tregion_end\tscore\tmin_depth\tmedian_depth\tconsensus"
            )?;
            self.header_written = true;
        }
        let region = h.active_region();
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{:.1}\t{}\t{:.1}\t{}",
            self.sample_name,
            region.ref_region().name(),
            region.start_kmer_index(),
            region.end_kmer_index(),
            h.score(),
            h.stats().min,
            h.stats().median,
            String::from_utf8_lossy(h.consensus()),
        )?;
        if let Some(trace) = h.trace() {
            for (step, cells) in trace.steps.iter().enumerate() {
                let rendered: Vec<String> = cells
                    .iter()
                    .map(|(row, score)| format!("{row}:{score:.0}"))
                    .collect();
                writeln!(self.out, "# step {}\t{}", step, rendered.join(","))?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
