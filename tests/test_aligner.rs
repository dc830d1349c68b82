mod util;

#[cfg(test)]
mod aligner_tests {
    use super::util::*;
    use kestrel::active::detector::ActiveRegion;
    use kestrel::active::stats::RegionStats;
    use kestrel::align::aligner::KmerAligner;
    use kestrel::align::builder::KmerAlignmentBuilder;
    use kestrel::align::haplotype::{consumed, AlignKind};
    use kestrel::align::weight::AlignmentWeight;
    use kestrel::counts::map::InMemoryCountMap;
    use kestrel::error::KestrelError;
    use kestrel::kmer::KmerUtil;
    use kestrel::region::ReferenceRegion;
    use std::sync::Arc;

    const K: usize = 5;

    fn make_region(
        reference: &[u8],
        start: usize,
        end: usize,
        left_end: bool,
        right_end: bool,
        stats_counts: &[u32],
    ) -> Arc<ActiveRegion> {
        let rr = Arc::new(ReferenceRegion::new("chr", reference, 0, reference.len(), 1).unwrap());
        let kutil = KmerUtil::new(K).unwrap();
        Arc::new(
            ActiveRegion::new(
                &rr,
                &kutil,
                start,
                end,
                left_end,
                right_end,
                false,
                RegionStats::from_counts(stats_counts),
            )
            .unwrap(),
        )
    }

    fn builder(map: &InMemoryCountMap) -> KmerAlignmentBuilder<'_> {
        KmerAlignmentBuilder::new(map, AlignmentWeight::default(), 10, 16, 0, false, false)
    }

    #[test]
    fn snp_reconstruction() {
        let reference = unique_seq(40, K);
        let mut sample = reference.clone();
        sample[20] = b'T';
        let map = map_from(K, &[&sample], 10);

        // k-mers covering the substitution collapsed; [15, 21] anchors on
        // both sides of it
        let region = make_region(&reference, 15, 21, false, false, &[10, 0, 0, 10]);
        let haps = builder(&map).build(&region).unwrap();

        assert_eq!(haps.len(), 1);
        let h = &haps[0];
        assert_eq!(h.consensus(), &sample[15..26]);
        assert!(!h.is_wildtype());
        assert_eq!(
            h.canonical_alignment(),
            &vec![
                (AlignKind::Match, 5),
                (AlignKind::Mismatch, 1),
                (AlignKind::Match, 5)
            ]
        );
        // S0 = 50, then 5 matches and 1 mismatch
        assert_eq!(h.score(), 90.0);
        assert!(h.score() >= 50.0);
        // the canonical walk consumes the whole region and consensus
        let (ref_used, con_used) = consumed(h.canonical_alignment());
        assert_eq!(ref_used, region.base_len());
        assert_eq!(con_used, h.len());
        // haplotype k-mer statistics come from the sample
        assert_eq!(h.stats().min, 10);
    }

    #[test]
    fn insertion_reconstruction() {
        let reference = unique_seq(40, K);
        let mut sample = reference[..20].to_vec();
        sample.extend_from_slice(b"TT");
        sample.extend_from_slice(&reference[20..]);
        let map = map_from(K, &[&sample], 10);

        let region = make_region(&reference, 15, 27, false, false, &[10, 0, 10]);
        let haps = builder(&map).build(&region).unwrap();

        assert_eq!(haps.len(), 1);
        let h = &haps[0];
        assert_eq!(h.consensus(), &sample[15..34]);
        assert_eq!(
            h.canonical_alignment(),
            &vec![
                (AlignKind::Match, 5),
                (AlignKind::Ins, 2),
                (AlignKind::Match, 12)
            ]
        );
        // S0 = 50, gap open+2 extends = -48, then 12 matches
        assert_eq!(h.score(), 122.0);
        let (ref_used, con_used) = consumed(h.canonical_alignment());
        assert_eq!(ref_used, region.base_len());
        assert_eq!(con_used, h.len());
    }

    #[test]
    fn deletion_bridges_the_consensus_gap() {
        // GACT anchor, TT deleted from the consensus, ACGA closes the
        // region; weights with a mild gap-open so a 2-base deletion
        // survives the k = 4 seed score
        let k4 = KmerUtil::new(4).unwrap();
        let weights = AlignmentWeight::normalized(10.0, -10.0, -10.0, -4.0, 0.0).unwrap();
        let reference = b"GACTTTACGA".to_vec();
        let rr = Arc::new(ReferenceRegion::new("chr", &reference, 0, 10, 1).unwrap());
        let region = Arc::new(
            ActiveRegion::new(
                &rr,
                &k4,
                0,
                6,
                false,
                false,
                false,
                RegionStats::from_counts(&[10]),
            )
            .unwrap(),
        );

        let mut aligner = KmerAligner::new(weights, k4.clone(), 10, 16, false);
        aligner.init(&region);
        for &b in b"ACGA" {
            aligner.add_base(b).unwrap();
        }
        let map = InMemoryCountMap::new(k4);
        let haps = aligner.take_haplotypes(&map, false).unwrap();

        assert_eq!(haps.len(), 1);
        let h = &haps[0];
        assert_eq!(h.consensus(), b"GACTACGA");
        assert_eq!(h.alignments().len(), 1);
        assert_eq!(
            h.canonical_alignment(),
            &vec![
                (AlignKind::Match, 4),
                (AlignKind::Del, 2),
                (AlignKind::Match, 4)
            ]
        );
        // S0 = 40, gap open = -14, extend = -4, then 4 matches
        assert_eq!(h.score(), 62.0);
        let (ref_used, con_used) = consumed(h.canonical_alignment());
        assert_eq!(ref_used, region.base_len());
        assert_eq!(con_used, h.len());
    }

    #[test]
    fn branching_walk_returns_both_haplotypes() {
        let reference = unique_seq(40, K);
        let mut variant = reference.clone();
        variant[20] = b'T';
        // both alleles present at equal depth
        let map = map_from(K, &[&reference, &variant], 10);

        let region = make_region(&reference, 15, 21, false, false, &[10, 10]);
        let haps = builder(&map).build(&region).unwrap();

        assert_eq!(haps.len(), 2);
        assert_eq!(haps.iter().filter(|h| h.is_wildtype()).count(), 1);
        // wildtype aligns 6 matches past the anchor, variant takes the
        // mismatch, so wildtype sorts first on score
        assert!(haps[0].is_wildtype());
        assert_eq!(haps[0].score(), 110.0);
        assert_eq!(haps[1].score(), 90.0);
    }

    #[test]
    fn left_open_region_extends_leftward() {
        let reference = unique_seq(30, K);
        let mut sample = reference.clone();
        sample[2] = b'T';
        let map = map_from(K, &[&sample], 10);

        let region = make_region(&reference, 0, 3, true, false, &[0, 0, 0, 10]);
        let haps = builder(&map).build(&region).unwrap();

        assert_eq!(haps.len(), 1);
        let h = &haps[0];
        // consensus comes back in reference orientation
        assert_eq!(h.consensus(), &sample[0..8]);
        assert_eq!(
            h.canonical_alignment(),
            &vec![
                (AlignKind::Match, 2),
                (AlignKind::Mismatch, 1),
                (AlignKind::Match, 5)
            ]
        );
        // S0 = 50, two matches and one mismatch walking left
        assert_eq!(h.score(), 60.0);
    }

    #[test]
    fn tied_insertion_placements_branch() {
        // GACT anchor, then an A-run; the consensus carries one extra A
        // whose placement inside the run is ambiguous
        let k4 = KmerUtil::new(4).unwrap();
        let reference = b"GACTAAACGT".to_vec();
        let rr = Arc::new(ReferenceRegion::new("chr", &reference, 0, 10, 1).unwrap());
        let region = Arc::new(
            ActiveRegion::new(
                &rr,
                &k4,
                0,
                6,
                false,
                false,
                false,
                RegionStats::from_counts(&[10]),
            )
            .unwrap(),
        );

        let mut aligner = KmerAligner::new(AlignmentWeight::default(), k4.clone(), 10, 16, false);
        aligner.init(&region);
        for &b in b"AAAACGT" {
            aligner.add_base(b).unwrap();
        }
        let map = InMemoryCountMap::new(k4);
        let haps = aligner.take_haplotypes(&map, false).unwrap();

        assert_eq!(haps.len(), 1);
        let h = &haps[0];
        assert_eq!(h.consensus(), b"GACTAAAACGT");
        // one insertion in a 3-base homopolymer ties three placements; the
        // fourth, hard against the anchor, dips below the zero floor
        assert_eq!(h.alignments().len(), 3);
        // canonical ordering puts the gap as early as it can survive
        assert_eq!(
            h.canonical_alignment(),
            &vec![
                (AlignKind::Match, 5),
                (AlignKind::Ins, 1),
                (AlignKind::Match, 5)
            ]
        );
        // alignments are sorted: every later alignment compares greater
        for pair in h.alignments().windows(2) {
            assert!(kestrel::align::haplotype::cmp_ops(&pair[0], &pair[1]).is_le());
        }
        assert_eq!(h.score(), 56.0);
    }

    #[test]
    fn add_base_requires_init() {
        let kutil = KmerUtil::new(K).unwrap();
        let mut aligner = KmerAligner::new(AlignmentWeight::default(), kutil, 10, 16, false);
        match aligner.add_base(b'A') {
            Err(KestrelError::InitRequired) => {}
            other => panic!("expected InitRequired, got {other:?}"),
        }
    }
}
