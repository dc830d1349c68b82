mod util;

#[cfg(test)]
mod variant_tests {
    use kestrel::active::detector::ActiveRegion;
    use kestrel::active::stats::RegionStats;
    use kestrel::align::haplotype::{AlignKind, AlignOps, Haplotype};
    use kestrel::kmer::KmerUtil;
    use kestrel::region::ReferenceRegion;
    use kestrel::variant::call::{VariantCall, VariantKind};
    use kestrel::variant::caller::{CallerParams, VariantCaller};
    use kestrel::variant::filter::{parse_filter_spec, FilterChain};
    use kestrel::writer::{
        HaplotypeWriter, TsvVariantWriter, VariantWriter, VcfVariantWriter,
    };
    use kestrel::writer::TsvHaplotypeWriter;
    use std::sync::Arc;

    const K: usize = 4;
    const REF: &[u8] = b"ACGGTACCGGTTAACC";

    fn region_on(
        reference: &[u8],
        left_flank: usize,
        right_flank_index: usize,
        offset: u64,
    ) -> Arc<ActiveRegion> {
        let rr = Arc::new(
            ReferenceRegion::new("chr", reference, left_flank, right_flank_index, offset).unwrap(),
        );
        let kutil = KmerUtil::new(K).unwrap();
        Arc::new(
            ActiveRegion::new(
                &rr,
                &kutil,
                2,
                8,
                false,
                false,
                false,
                RegionStats::from_counts(&[7, 50]),
            )
            .unwrap(),
        )
    }

    /// Haplotype whose consensus is derived from the region slice by the
    /// given alignment, so the pair is internally consistent.
    fn haplotype_for(region: &Arc<ActiveRegion>, ops: AlignOps, consensus: Vec<u8>) -> Haplotype {
        Haplotype::new(
            consensus,
            Arc::clone(region),
            vec![ops],
            80.0,
            RegionStats::from_counts(&[7]),
            None,
        )
    }

    /// Re-apply called variants to the reference slice; property 10 says
    /// the result is the consensus, byte for byte.
    fn apply_variants(region: &Arc<ActiveRegion>, calls: &[VariantCall]) -> Vec<u8> {
        let seq = region.ref_region().sequence();
        let start = region.start_kmer_index();
        let end = start + region.base_len();
        let mut out = Vec::new();
        let mut idx = start;
        for call in calls {
            match call.kind {
                VariantKind::Snp => {
                    out.extend_from_slice(&seq[idx..call.region_index]);
                    out.extend_from_slice(&call.alt_bases);
                    idx = call.region_index + 1;
                }
                VariantKind::Ins => {
                    // anchor base is shared between REF and ALT
                    out.extend_from_slice(&seq[idx..call.region_index + 1]);
                    out.extend_from_slice(&call.alt_bases[1..]);
                    idx = call.region_index + 1;
                }
                VariantKind::Del => {
                    out.extend_from_slice(&seq[idx..call.region_index + 1]);
                    idx = call.region_index + call.ref_bases.len();
                }
            }
        }
        out.extend_from_slice(&seq[idx..end]);
        out
    }

    #[test]
    fn mismatch_run_emits_snps() {
        let region = region_on(REF, 0, REF.len(), 1);
        // slice covers indices 2..12; substitution at slice offset 6
        let mut consensus = REF[2..12].to_vec();
        consensus[6] = b'T';
        assert_ne!(REF[8], b'T');
        let ops = vec![
            (AlignKind::Match, 6),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus.clone());

        let calls = VariantCaller::new(Arc::clone(&region), CallerParams::default()).call(&h);
        assert_eq!(calls.len(), 1);
        let v = &calls[0];
        assert_eq!(v.kind, VariantKind::Snp);
        assert_eq!(v.region_index, 8);
        assert_eq!(v.position, 9);
        assert_eq!(v.ref_bases, vec![REF[8]]);
        assert_eq!(v.alt_bases, vec![b'T']);
        assert_eq!(v.depth, 7);
        assert_eq!(apply_variants(&region, &calls), consensus);
    }

    #[test]
    fn insertion_is_left_anchored() {
        let region = region_on(REF, 0, REF.len(), 1);
        let mut consensus = REF[2..6].to_vec();
        consensus.extend_from_slice(b"TT");
        consensus.extend_from_slice(&REF[6..12]);
        let ops = vec![
            (AlignKind::Match, 4),
            (AlignKind::Ins, 2),
            (AlignKind::Match, 6),
        ];
        let h = haplotype_for(&region, ops, consensus.clone());

        let calls = VariantCaller::new(Arc::clone(&region), CallerParams::default()).call(&h);
        assert_eq!(calls.len(), 1);
        let v = &calls[0];
        assert_eq!(v.kind, VariantKind::Ins);
        // anchored on the base left of the event
        assert_eq!(v.region_index, 5);
        assert_eq!(v.position, 6);
        assert_eq!(v.ref_bases, vec![REF[5]]);
        assert_eq!(v.alt_bases, vec![REF[5], b'T', b'T']);
        assert_eq!(apply_variants(&region, &calls), consensus);
    }

    #[test]
    fn deletion_is_left_anchored() {
        let region = region_on(REF, 0, REF.len(), 1);
        let mut consensus = REF[2..6].to_vec();
        consensus.extend_from_slice(&REF[9..12]);
        let ops = vec![
            (AlignKind::Match, 4),
            (AlignKind::Del, 3),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus.clone());

        let calls = VariantCaller::new(Arc::clone(&region), CallerParams::default()).call(&h);
        assert_eq!(calls.len(), 1);
        let v = &calls[0];
        assert_eq!(v.kind, VariantKind::Del);
        assert_eq!(v.region_index, 5);
        assert_eq!(v.position, 6);
        assert_eq!(v.ref_bases, REF[5..9].to_vec());
        assert_eq!(v.alt_bases, vec![REF[5]]);
        assert_eq!(apply_variants(&region, &calls), consensus);
    }

    #[test]
    fn flank_variants_are_discarded() {
        // left flank reaches past the substitution site
        let region = region_on(REF, 9, REF.len(), 1);
        let mut consensus = REF[2..12].to_vec();
        consensus[6] = b'T';
        let ops = vec![
            (AlignKind::Match, 6),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus);

        let calls = VariantCaller::new(Arc::clone(&region), CallerParams::default()).call(&h);
        assert!(calls.is_empty());
    }

    #[test]
    fn positions_respect_offset_and_relative_mode() {
        // region cut from reference coordinate 101 onward
        let region = region_on(REF, 0, REF.len(), 101);
        let mut consensus = REF[2..12].to_vec();
        consensus[6] = b'T';
        let ops = vec![
            (AlignKind::Match, 6),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus);

        let absolute = VariantCaller::new(Arc::clone(&region), CallerParams::default()).call(&h);
        assert_eq!(absolute[0].position, 109);

        let relative = VariantCaller::new(
            Arc::clone(&region),
            CallerParams {
                relative_positions: true,
                ..CallerParams::default()
            },
        )
        .call(&h);
        assert_eq!(relative[0].position, 9);
    }

    #[test]
    fn ambiguous_variant_policy() {
        // N sits mid-region, outside both anchor k-mers
        let mut reference = REF.to_vec();
        reference[7] = b'N';
        let region = region_on(&reference, 0, reference.len(), 1);
        let mut consensus = reference[2..12].to_vec();
        consensus[5] = b'T'; // replaces the N at index 7
        let ops = vec![
            (AlignKind::Match, 5),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 4),
        ];
        let h = haplotype_for(&region, ops, consensus);

        let kept = VariantCaller::new(Arc::clone(&region), CallerParams::default()).call(&h);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].ref_bases, vec![b'N']);

        let dropped = VariantCaller::new(
            Arc::clone(&region),
            CallerParams {
                call_ambiguous_variant: false,
                ..CallerParams::default()
            },
        )
        .call(&h);
        assert!(dropped.is_empty());
    }

    #[test]
    fn filter_chain_drops_and_keeps() {
        let region = region_on(REF, 0, REF.len(), 1);
        let mut consensus = REF[2..12].to_vec();
        consensus[6] = b'T';
        let ops = vec![
            (AlignKind::Match, 6),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus);
        let call = VariantCaller::new(Arc::clone(&region), CallerParams::default())
            .call(&h)
            .remove(0);

        let mut deep = FilterChain::new();
        deep.push(parse_filter_spec("depth:10").unwrap());
        assert!(deep.apply(call.clone()).is_none());

        let mut chain = FilterChain::new();
        chain.push(parse_filter_spec("depth:5").unwrap());
        chain.push(parse_filter_spec("type:snp,del").unwrap());
        assert!(chain.apply(call.clone()).is_some());

        let mut indel_only = FilterChain::new();
        indel_only.push(parse_filter_spec("type:ins").unwrap());
        assert!(indel_only.apply(call).is_none());
    }

    #[test]
    fn vcf_writer_emits_header_and_record() {
        let region = region_on(REF, 0, REF.len(), 1);
        let mut consensus = REF[2..12].to_vec();
        consensus[6] = b'T';
        let ops = vec![
            (AlignKind::Match, 6),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus);
        let call = VariantCaller::new(Arc::clone(&region), CallerParams::default())
            .call(&h)
            .remove(0);

        let mut writer = VcfVariantWriter::new(Vec::new());
        writer.set_sample_name("s1");
        writer.set_reference_region(region.ref_region());
        writer.write_variant(&call).unwrap();
        writer.flush().unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        assert!(text.starts_with("##fileformat=VCFv4.2\n"));
        assert!(text.contains("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1\n"));
        let record = text.lines().last().unwrap();
        let fields: Vec<&str> = record.split('\t').collect();
        assert_eq!(fields[0], "chr");
        assert_eq!(fields[1], "9");
        assert_eq!(fields[3], "G");
        assert_eq!(fields[4], "T");
        assert_eq!(fields[6], "PASS");
        assert!(fields[7].contains("DP=7"));
    }

    #[test]
    fn tsv_writers_emit_rows() {
        let region = region_on(REF, 0, REF.len(), 1);
        let mut consensus = REF[2..12].to_vec();
        consensus[6] = b'T';
        let ops = vec![
            (AlignKind::Match, 6),
            (AlignKind::Mismatch, 1),
            (AlignKind::Match, 3),
        ];
        let h = haplotype_for(&region, ops, consensus);
        let call = VariantCaller::new(Arc::clone(&region), CallerParams::default())
            .call(&h)
            .remove(0);

        let mut vw = TsvVariantWriter::new(Vec::new());
        vw.set_sample_name("s1");
        vw.write_variant(&call).unwrap();
        vw.flush().unwrap();
        let text = String::from_utf8(vw.into_inner()).unwrap();
        assert!(text.starts_with("sample\tchrom\tpos\t"));
        assert!(text.contains("s1\tchr\t9\tSNP\tG\tT\t7\t80.0"));

        let mut hw = TsvHaplotypeWriter::new(Vec::new());
        hw.set_sample_name("s1");
        hw.write_haplotype(&h).unwrap();
        hw.flush().unwrap();
        let text = String::from_utf8(hw.into_inner()).unwrap();
        assert!(text.contains("s1\tchr\t2\t8\t80.0\t7\t"));
    }
}
