//! Count-distribution summaries.

/// Five-number summary (plus n) of a k-mer count slice. Attached to every
/// active region over its profile range and to every haplotype over its
/// consensus k-mers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub min: u32,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: u32,
    pub n: usize,
}

impl RegionStats {
    pub fn from_counts(counts: &[u32]) -> RegionStats {
        if counts.is_empty() {
            return RegionStats {
                min: 0,
                q25: 0.0,
                median: 0.0,
                q75: 0.0,
                max: 0,
                n: 0,
            };
        }
        let mut sorted = counts.to_vec();
        sorted.sort_unstable();
        RegionStats {
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.50),
            q75: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
            n: sorted.len(),
        }
    }
}

/// Linear-interpolated quantile of an already-sorted slice.
pub fn quantile(sorted: &[u32], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = pos - lo as f64;
    f64::from(sorted[lo]) + (f64::from(sorted[hi]) - f64::from(sorted[lo])) * frac
}
