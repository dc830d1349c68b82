mod util;

#[cfg(test)]
mod end_to_end_tests {
    use super::util::*;
    use kestrel::active::detector::DetectorParams;
    use kestrel::align::weight::AlignmentWeight;
    use kestrel::counts::map::{CountMap, InMemoryCountMap, Sample};
    use kestrel::kmer::KmerUtil;
    use kestrel::pipeline::{Pipeline, PipelineConfig, RunSummary};
    use kestrel::region::{load_intervals, load_reference_regions, ReferenceRegion};
    use kestrel::variant::caller::CallerParams;
    use kestrel::variant::filter::FilterChain;
    use kestrel::writer::{TsvHaplotypeWriter, TsvVariantWriter, VariantWriter, VcfVariantWriter};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    const K: usize = 11;

    fn write_fasta(path: &Path, name: &str, seq: &[u8]) {
        let mut text = format!(">{name}\n");
        text.push_str(std::str::from_utf8(seq).unwrap());
        text.push('\n');
        fs::write(path, text).unwrap();
    }

    fn write_fastq(path: &Path, seq: &[u8], copies: usize) {
        let mut text = String::new();
        for i in 0..copies {
            text.push_str(&format!("@read{i}\n"));
            text.push_str(std::str::from_utf8(seq).unwrap());
            text.push_str("\n+\n");
            text.push_str(&"I".repeat(seq.len()));
            text.push('\n');
        }
        fs::write(path, text).unwrap();
    }

    fn config(detector: DetectorParams) -> PipelineConfig {
        PipelineConfig {
            kmer_size: K,
            count_reverse: false,
            detector,
            weights: AlignmentWeight::default(),
            caller: CallerParams::default(),
            trace_matrix: false,
        }
    }

    /// Load counts from a FASTQ on disk and call variants against a FASTA
    /// reference, returning the TSV output and the run summary.
    fn call_with(
        reference: &[u8],
        sample_seq: &[u8],
        detector: DetectorParams,
    ) -> (String, RunSummary) {
        let dir = tempfile::tempdir().unwrap();
        let ref_path = dir.path().join("ref.fasta");
        let reads_path = dir.path().join("reads.fastq");
        write_fasta(&ref_path, "ref", reference);
        write_fastq(&reads_path, sample_seq, 10);

        let mut counts = InMemoryCountMap::new(KmerUtil::new(K).unwrap());
        counts
            .set(&Sample {
                name: "s1".into(),
                files: vec![reads_path],
            })
            .unwrap();

        let regions: Vec<Arc<ReferenceRegion>> = load_reference_regions(&ref_path, None, K)
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect();

        let pipeline = Pipeline::new(config(detector)).unwrap();
        let mut writer = TsvVariantWriter::new(Vec::new());
        writer.set_sample_name("s1");
        let summary = pipeline
            .run(&counts, &regions, &FilterChain::new(), &mut writer, None, || ())
            .unwrap();
        (String::from_utf8(writer.into_inner()).unwrap(), summary)
    }

    #[test]
    fn substitution_is_called_with_both_anchors() {
        let reference = unique_seq(90, K);
        let mut sample = reference.clone();
        sample[45] = b'T';

        let (tsv, summary) = call_with(&reference, &sample, DetectorParams::default());
        assert_eq!(summary.active_regions, 1);
        assert_eq!(summary.variants, 1);
        let expected = format!(
            "s1\tref\t46\tSNP\t{}\tT\t10\t210.0",
            reference[45] as char
        );
        assert!(tsv.contains(&expected), "missing {expected:?} in {tsv}");
    }

    #[test]
    fn insertion_is_called_with_vcf_anchor_convention() {
        let reference = unique_seq(90, K);
        let mut sample = reference[..45].to_vec();
        sample.extend_from_slice(b"TTTT");
        sample.extend_from_slice(&reference[45..]);

        let (tsv, summary) = call_with(&reference, &sample, DetectorParams::default());
        assert_eq!(summary.variants, 1);
        let anchor = reference[44] as char;
        let expected = format!("s1\tref\t45\tINS\t{anchor}\t{anchor}TTTT\t10\t");
        assert!(tsv.contains(&expected), "missing {expected:?} in {tsv}");
    }

    #[test]
    fn wildtype_sample_produces_no_calls() {
        let reference = unique_seq(90, K);
        let (tsv, summary) = call_with(&reference, &reference, DetectorParams::default());
        assert_eq!(summary.variants, 0);
        assert_eq!(summary.active_regions, 0);
        assert_eq!(summary.counters.right_scans, 0);
        assert_eq!(summary.counters.left_scans, 0);
        assert!(tsv.is_empty());
    }

    #[test]
    fn left_end_substitution_needs_open_anchoring() {
        let reference = unique_seq(90, K);
        let mut sample = reference.clone();
        sample[4] = b'T';

        // both-end anchoring rejects a variant that runs into the start
        let (_, strict) = call_with(&reference, &sample, DetectorParams::default());
        assert_eq!(strict.variants, 0);

        // open anchoring reports it from the right anchor
        let open = DetectorParams {
            anchor_both_ends: false,
            ..DetectorParams::default()
        };
        let (tsv, summary) = call_with(&reference, &sample, open);
        assert_eq!(summary.variants, 1);
        let expected = format!("s1\tref\t5\tSNP\t{}\tT\t10\t", reference[4] as char);
        assert!(tsv.contains(&expected), "missing {expected:?} in {tsv}");
    }

    #[test]
    fn ambiguous_region_policy_silences_calls() {
        let mut reference = unique_seq(90, K);
        reference[44] = b'N';
        let mut sample = unique_seq(90, K);
        sample[45] = b'T';

        let strict = DetectorParams {
            call_ambiguous_regions: false,
            ..DetectorParams::default()
        };
        let (tsv, summary) = call_with(&reference, &sample, strict);
        assert_eq!(summary.variants, 0);
        assert!(tsv.is_empty());
    }

    #[test]
    fn bed_intervals_restrict_calling_but_keep_coordinates() {
        let reference = unique_seq(90, K);
        let mut sample = reference.clone();
        sample[45] = b'T';

        let dir = tempfile::tempdir().unwrap();
        let ref_path = dir.path().join("ref.fasta");
        let reads_path = dir.path().join("reads.fastq");
        let bed_path = dir.path().join("targets.bed");
        write_fasta(&ref_path, "ref", &reference);
        write_fastq(&reads_path, &sample, 10);
        fs::write(&bed_path, "# targets\nref\t20\t70\n").unwrap();

        let mut counts = InMemoryCountMap::new(KmerUtil::new(K).unwrap());
        counts
            .set(&Sample {
                name: "s1".into(),
                files: vec![reads_path],
            })
            .unwrap();
        let intervals = load_intervals(&bed_path).unwrap();
        let regions: Vec<Arc<ReferenceRegion>> =
            load_reference_regions(&ref_path, Some(&intervals), K)
                .unwrap()
                .into_iter()
                .map(Arc::new)
                .collect();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].sequence_offset(), 10);
        assert_eq!(regions[0].left_flank(), K);

        let pipeline = Pipeline::new(config(DetectorParams::default())).unwrap();
        let mut writer = VcfVariantWriter::new(Vec::new());
        writer.set_sample_name("s1");
        let summary = pipeline
            .run(&counts, &regions, &FilterChain::new(), &mut writer, None, || ())
            .unwrap();
        assert_eq!(summary.variants, 1);

        let text = String::from_utf8(writer.into_inner()).unwrap();
        let record = text.lines().last().unwrap();
        let fields: Vec<&str> = record.split('\t').collect();
        // absolute reference coordinate survives the interval cut
        assert_eq!(fields[0], "ref");
        assert_eq!(fields[1], "46");
        assert_eq!(fields[4], "T");
    }

    #[test]
    fn haplotype_writer_receives_the_consensus() {
        let reference = unique_seq(90, K);
        let mut sample = reference.clone();
        sample[45] = b'T';

        let dir = tempfile::tempdir().unwrap();
        let ref_path = dir.path().join("ref.fasta");
        let reads_path = dir.path().join("reads.fastq");
        write_fasta(&ref_path, "ref", &reference);
        write_fastq(&reads_path, &sample, 10);

        let mut counts = InMemoryCountMap::new(KmerUtil::new(K).unwrap());
        counts
            .set(&Sample {
                name: "s1".into(),
                files: vec![reads_path],
            })
            .unwrap();
        let regions: Vec<Arc<ReferenceRegion>> = load_reference_regions(&ref_path, None, K)
            .unwrap()
            .into_iter()
            .map(Arc::new)
            .collect();

        let pipeline = Pipeline::new(config(DetectorParams::default())).unwrap();
        let mut vw = TsvVariantWriter::new(Vec::new());
        let mut hw = TsvHaplotypeWriter::new(Vec::new());
        let summary = pipeline
            .run(
                &counts,
                &regions,
                &FilterChain::new(),
                &mut vw,
                Some(&mut hw),
                || (),
            )
            .unwrap();
        assert_eq!(summary.haplotypes, 1);

        let text = String::from_utf8(hw.into_inner()).unwrap();
        let consensus_field = text.lines().nth(1).unwrap().split('\t').last().unwrap();
        assert_eq!(consensus_field.as_bytes(), &sample[34..57]);
    }
}
