use crate::active::detector::DetectorParams;
use crate::align::weight::AlignmentWeight;
use crate::error::Result;
use crate::variant::caller::CallerParams;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Vcf,
    Tsv,
}

#[derive(Debug, Args)]
pub struct IoArgs {
    /// Reference FASTA file [path]
    #[clap(short = 'r', long, value_parser, required = true, help_heading = "Core")]
    pub reference: PathBuf,

    /// Sample read files, FASTA/FASTQ, optionally gzipped [path]
    #[clap(short = 's', long = "sample", num_args = 1.., required = true, help_heading = "Core")]
    pub samples: Vec<PathBuf>,

    /// Variant output file; stdout when omitted [path]
    #[clap(short = 'o', long, value_parser, help_heading = "Core")]
    pub output: Option<PathBuf>,

    /// Optional haplotype table output [path]
    #[clap(long, value_parser, help_heading = "Core")]
    pub haplotype_output: Option<PathBuf>,

    /// Variant output format
    #[clap(long, value_enum, default_value = "vcf", help_heading = "Core")]
    pub format: OutputFormat,

    /// Sample name for output columns; defaults to the first read file stem
    #[clap(long, help_heading = "Core")]
    pub sample_name: Option<String>,

    /// Number of threads for count loading (increases RAM usage) [integer]
    #[clap(short = 't', long, default_value = "1", help_heading = "Core")]
    pub n_threads: usize,
}

#[derive(Debug, Args)]
pub struct KmerArgs {
    /// K-mer size [integer]
    #[clap(short = 'k', long, default_value = "31", help_heading = "Core")]
    pub kmer_size: usize,

    /// Count only forward k-mers instead of adding reverse complements [flag]
    #[clap(long, help_heading = "Core")]
    pub forward_only: bool,
}

#[derive(Debug, Args)]
pub struct RegionArgs {
    /// BED file restricting calling to intervals [path]
    #[clap(long = "by-bed", value_parser, help_heading = "Regions")]
    pub by_bed: Option<PathBuf>,

    /// Flank bases kept around each interval; defaults to the k-mer size [integer]
    #[clap(long, help_heading = "Regions")]
    pub flank: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DetectorArgs {
    /// Floor on the count difference that may trigger a scan [integer]
    #[clap(long, default_value = "5", help_heading = "Active regions")]
    pub min_difference: u32,

    /// Quantile of |Δcount| raising the trigger floor; 0 disables [float]
    #[clap(long, default_value = "0.90", help_heading = "Active regions")]
    pub difference_quantile: f64,

    /// Keep regions that run into an end of the reference [flag]
    #[clap(long, help_heading = "Active regions")]
    pub no_anchor_both_ends: bool,

    /// Reject regions containing ambiguous reference bases [flag]
    #[clap(long, help_heading = "Active regions")]
    pub no_call_ambiguous_regions: bool,

    /// Peak-detection lookahead; 0 disables [integer]
    #[clap(long, default_value = "7", help_heading = "Active regions")]
    pub peak_scan_length: usize,

    /// Scan length cap factor, in units of k [float]
    #[clap(long, default_value = "5.0", help_heading = "Active regions")]
    pub scan_limit_factor: f64,

    /// Lower bound of the decaying recovery threshold, as a fraction of
    /// the anchor count; 1.0 uses a constant threshold [float]
    #[clap(long, default_value = "0.55", help_heading = "Active regions")]
    pub exp_decay_min: f64,

    /// Recovery threshold decay at k bases from the anchor [float]
    #[clap(long, default_value = "0.80", help_heading = "Active regions")]
    pub exp_decay_alpha: f64,

    /// Give up instead of searching for a sharp edge when the decay never
    /// recovers [flag]
    #[clap(long, help_heading = "Active regions")]
    pub no_recover_anchor: bool,

    /// Emit wildtype regions covering the gaps between variant regions [flag]
    #[clap(long, help_heading = "Active regions")]
    pub emit_wildtype: bool,

    /// Saved aligner states before eviction [integer]
    #[clap(long, default_value = "10", help_heading = "Alignment")]
    pub max_aligner_state: usize,

    /// Haplotype cap per region [integer]
    #[clap(long, default_value = "16", help_heading = "Alignment")]
    pub max_haplotypes: usize,

    /// Times one k-mer may reappear on a consensus path [integer]
    #[clap(long, default_value = "0", help_heading = "Alignment")]
    pub max_repeat_count: u32,
}

impl DetectorArgs {
    pub fn to_params(&self) -> DetectorParams {
        DetectorParams {
            minimum_difference: self.min_difference,
            difference_quantile: self.difference_quantile,
            anchor_both_ends: !self.no_anchor_both_ends,
            call_ambiguous_regions: !self.no_call_ambiguous_regions,
            peak_scan_length: self.peak_scan_length,
            scan_limit_factor: self.scan_limit_factor,
            exp_decay_min: self.exp_decay_min,
            exp_decay_alpha: self.exp_decay_alpha,
            recover_right_anchor: !self.no_recover_anchor,
            emit_wildtype_regions: self.emit_wildtype,
            max_aligner_state: self.max_aligner_state,
            max_haplotypes: self.max_haplotypes,
            max_repeat_count: self.max_repeat_count,
        }
    }
}

#[derive(Debug, Args)]
pub struct WeightArgs {
    /// Match score [float]
    #[clap(long, default_value = "10", allow_hyphen_values = true, help_heading = "Alignment")]
    pub match_score: f32,

    /// Mismatch penalty [float]
    #[clap(long, default_value = "-10", allow_hyphen_values = true, help_heading = "Alignment")]
    pub mismatch: f32,

    /// Gap-open penalty [float]
    #[clap(long, default_value = "-40", allow_hyphen_values = true, help_heading = "Alignment")]
    pub gap_open: f32,

    /// Gap-extend penalty [float]
    #[clap(long, default_value = "-4", allow_hyphen_values = true, help_heading = "Alignment")]
    pub gap_extend: f32,

    /// Initial alignment score; 0 uses match · k [float]
    #[clap(long, default_value = "0", allow_hyphen_values = true, help_heading = "Alignment")]
    pub init_score: f32,
}

impl WeightArgs {
    pub fn to_weights(&self) -> Result<AlignmentWeight> {
        AlignmentWeight::normalized(
            self.match_score,
            self.mismatch,
            self.gap_open,
            self.gap_extend,
            self.init_score,
        )
    }
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Report positions relative to the region instead of the reference [flag]
    #[clap(long, help_heading = "Output")]
    pub relative_positions: bool,

    /// Drop variants touching ambiguous bases [flag]
    #[clap(long, help_heading = "Output")]
    pub no_ambiguous_variants: bool,

    /// Retain and emit the alignment trace matrix with haplotypes [flag]
    #[clap(long, help_heading = "Output")]
    pub trace_matrix: bool,

    /// Variant filters, e.g. depth:5 or type:snp,ins [spec]
    #[clap(long = "filter", num_args = 1.., help_heading = "Output")]
    pub filters: Vec<String>,
}

impl OutputArgs {
    pub fn to_caller_params(&self) -> CallerParams {
        CallerParams {
            relative_positions: self.relative_positions,
            call_ambiguous_variant: !self.no_ambiguous_variants,
        }
    }
}
