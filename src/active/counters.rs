/// Scan and acceptance tallies for one detector pass; logged at debug level
/// after each region.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetectorCounters {
    pub right_scans: u64,
    pub left_scans: u64,
    pub peaks_skipped: u64,
    pub abandoned: u64,
    pub rejected_short: u64,
    pub rejected_ambiguous: u64,
    pub rejected_wildtype: u64,
    pub rejected_anchor: u64,
    pub accepted: u64,
    pub wildtype_emitted: u64,
}

impl std::ops::AddAssign for DetectorCounters {
    fn add_assign(&mut self, other: Self) {
        self.right_scans += other.right_scans;
        self.left_scans += other.left_scans;
        self.peaks_skipped += other.peaks_skipped;
        self.abandoned += other.abandoned;
        self.rejected_short += other.rejected_short;
        self.rejected_ambiguous += other.rejected_ambiguous;
        self.rejected_wildtype += other.rejected_wildtype;
        self.rejected_anchor += other.rejected_anchor;
        self.accepted += other.accepted;
        self.wildtype_emitted += other.wildtype_emitted;
    }
}
