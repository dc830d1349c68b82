use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use kestrel::cli::opts::{
    DetectorArgs, IoArgs, KmerArgs, OutputArgs, OutputFormat, RegionArgs, WeightArgs,
};
use kestrel::counts::map::{CountMap, InMemoryCountMap, Sample};
use kestrel::kmer::KmerUtil;
use kestrel::pipeline::{Pipeline, PipelineConfig};
use kestrel::region::{load_intervals, load_reference_regions};
use kestrel::variant::filter::{parse_filter_spec, FilterChain};
use kestrel::writer::{
    HaplotypeWriter, TsvHaplotypeWriter, TsvVariantWriter, VariantWriter, VcfVariantWriter,
};
use kestrel::KestrelError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;

/// Command-line options for the k-mer variant caller
#[derive(Parser)]
#[command(
    name = "kestrel",
    about = "Call sequence variants from k-mer frequencies, without read mapping",
    long_about = "Call sequence variants from k-mer frequencies, without read mapping.


EXAMPLES:
    // Whole reference, VCF to stdout
    $ kestrel -r ref.fasta -s reads_1.fastq.gz reads_2.fastq.gz -k 31

    // Restrict to intervals, write VCF and haplotypes
    $ kestrel -r ref.fasta -s reads.fastq --by-bed targets.bed -o out.vcf --haplotype-output haps.tsv
    ",
    version
)]
struct Cli {
    #[command(flatten)]
    io: IoArgs,

    #[command(flatten)]
    kmer: KmerArgs,

    #[command(flatten)]
    regions: RegionArgs,

    #[command(flatten)]
    detector: DetectorArgs,

    #[command(flatten)]
    weights: WeightArgs,

    #[command(flatten)]
    output: OutputArgs,
}

fn main() {
    env_logger::init();
    // Catch and handle errors; exit code reflects the error class
    if let Err(e) = run() {
        eprintln!("{:?}", e);
        let code = e
            .downcast_ref::<KestrelError>()
            .map(KestrelError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
    std::process::exit(0);
}

fn run() -> Result<()> {
    let start_time = Instant::now();
    let opt = Cli::parse();

    let config = PipelineConfig {
        kmer_size: opt.kmer.kmer_size,
        count_reverse: !opt.kmer.forward_only,
        detector: opt.detector.to_params(),
        weights: opt.weights.to_weights()?,
        caller: opt.output.to_caller_params(),
        trace_matrix: opt.output.trace_matrix,
    };
    let pipeline = Pipeline::new(config)?;

    let mut filters = FilterChain::new();
    for spec in &opt.output.filters {
        filters.push(parse_filter_spec(spec)?);
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.io.n_threads)
        .build_global()
        .context("building rayon thread pool")?;

    // Calling regions
    let intervals = match &opt.regions.by_bed {
        Some(bed) => Some(load_intervals(bed)?),
        None => None,
    };
    let flank = opt.regions.flank.unwrap_or(opt.kmer.kmer_size);
    let regions: Vec<_> = load_reference_regions(&opt.io.reference, intervals.as_ref(), flank)?
        .into_iter()
        .map(Arc::new)
        .collect();
    if regions.is_empty() {
        anyhow::bail!("no calling regions found in {:?}", opt.io.reference);
    }

    // Sample counts
    let sample_name = opt.io.sample_name.clone().unwrap_or_else(|| {
        opt.io.samples[0]
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("sample"))
    });
    let sample = Sample {
        name: sample_name.clone(),
        files: opt.io.samples.clone(),
    };
    println!("Start: Loading sample k-mers");
    let mut counts = InMemoryCountMap::new(KmerUtil::new(opt.kmer.kmer_size)?);
    counts.set(&sample)?;

    // Writers
    let out: Box<dyn Write> = match &opt.io.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).context("creating variant output")?,
        )),
        None => Box::new(std::io::stdout()),
    };
    let mut variant_writer: Box<dyn VariantWriter> = match opt.io.format {
        OutputFormat::Vcf => Box::new(VcfVariantWriter::new(out)),
        OutputFormat::Tsv => Box::new(TsvVariantWriter::new(out)),
    };
    variant_writer.set_sample_name(&sample_name);

    let mut haplotype_writer: Option<Box<dyn HaplotypeWriter>> = match &opt.io.haplotype_output {
        Some(path) => {
            let mut hw = TsvHaplotypeWriter::new(BufWriter::new(
                File::create(path).context("creating haplotype output")?,
            ));
            hw.set_sample_name(&sample_name);
            Some(Box::new(hw))
        }
        None => None,
    };

    // Main loop: process each region
    println!("Start: Calling {} region(s)", regions.len());
    let pb = ProgressBar::new(regions.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("       {bar:40} {pos}/{len} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    let summary = pipeline.run(
        &counts,
        &regions,
        &filters,
        variant_writer.as_mut(),
        haplotype_writer.as_deref_mut(),
        || pb.inc(1),
    )?;
    pb.finish_with_message("| Finished calling");
    counts.free();

    println!(
        "Called {} variant(s) from {} active region(s) ({} region(s) failed)",
        summary.variants, summary.active_regions, summary.failed_regions
    );
    let elapsed = start_time.elapsed();
    println!("Elapsed time: {:.2?}", elapsed);
    Ok(())
}
