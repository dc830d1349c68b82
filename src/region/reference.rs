//! Reference sequences and the regions cut from them.

use crate::error::{KestrelError, Result};
use crate::kmer::base;
use fxhash::FxHashMap;
use log::debug;
use std::path::{Path, PathBuf};

/// A contiguous slice of a reference sequence, with optional flanks kept on
/// either side so variants near interval edges still have anchor context.
///
/// Invariants: `left_flank <= right_flank_index <= size`, and every byte of
/// `sequence` is a normalized uppercase IUPAC code.
#[derive(Debug, Clone)]
pub struct ReferenceRegion {
    name: String,
    sequence: Vec<u8>,
    left_flank: usize,
    right_flank_index: usize,
    /// 1-based reference coordinate of `sequence[0]`.
    sequence_offset: u64,
    /// Merged, sorted half-open runs of ambiguous bases.
    ambiguous: Vec<(usize, usize)>,
}

impl ReferenceRegion {
    /// Normalize `raw` and wrap it as a region.
    ///
    /// Gap bytes and non-IUPAC bytes are input-data errors; ambiguity codes
    /// are accepted and indexed for overlap queries.
    pub fn new(
        name: impl Into<String>,
        raw: &[u8],
        left_flank: usize,
        right_flank_index: usize,
        sequence_offset: u64,
    ) -> Result<ReferenceRegion> {
        let name = name.into();
        let mut sequence = Vec::with_capacity(raw.len());
        let mut ambiguous: Vec<(usize, usize)> = Vec::new();
        for (pos, &b) in raw.iter().enumerate() {
            if base::is_gap(b) {
                return Err(KestrelError::GapInReference { name, pos });
            }
            let norm = match base::normalize(b) {
                Some(n) => n,
                None => return Err(KestrelError::InvalidBase { name, pos, byte: b }),
            };
            if !base::is_canonical(norm) {
                match ambiguous.last_mut() {
                    // extend the open run
                    Some(run) if run.1 == pos => run.1 = pos + 1,
                    _ => ambiguous.push((pos, pos + 1)),
                }
            }
            sequence.push(norm);
        }
        if left_flank > right_flank_index || right_flank_index > sequence.len() {
            return Err(KestrelError::Config(format!(
                "region {}: flank bounds {}..{} outside 0..{}",
                name,
                left_flank,
                right_flank_index,
                sequence.len()
            )));
        }
        Ok(ReferenceRegion {
            name,
            sequence,
            left_flank,
            right_flank_index,
            sequence_offset,
            ambiguous,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn left_flank(&self) -> usize {
        self.left_flank
    }

    #[inline]
    pub fn right_flank_index(&self) -> usize {
        self.right_flank_index
    }

    #[inline]
    pub fn sequence_offset(&self) -> u64 {
        self.sequence_offset
    }

    /// 1-based reference coordinate of a 0-based index into `sequence`.
    #[inline]
    pub fn reference_position(&self, index: usize) -> u64 {
        self.sequence_offset + index as u64
    }

    /// True when `index` falls inside the left or right flank.
    #[inline]
    pub fn in_flank(&self, index: usize) -> bool {
        index < self.left_flank || index >= self.right_flank_index
    }

    /// Overlap query against the precomputed ambiguity runs, `[start, end)`.
    pub fn has_ambiguous(&self, start: usize, end: usize) -> bool {
        // first run ending after `start`
        let idx = self.ambiguous.partition_point(|&(_, e)| e <= start);
        match self.ambiguous.get(idx) {
            Some(&(s, _)) => s < end,
            None => false,
        }
    }

    #[cfg(test)]
    pub fn ambiguous_runs(&self) -> &[(usize, usize)] {
        &self.ambiguous
    }
}

/* ---------- FASTA loading ------------------------------------------- */

/// Read every record of a FASTA file and cut calling regions from it.
///
/// Without intervals one region spans each contig (no flanks). With
/// intervals, each `[start, end)` pair is expanded by `flank` bases on both
/// sides, clamped to the contig; the flank lengths actually obtained are
/// recorded on the region so variant calls inside flanks can be dropped.
pub fn load_reference_regions(
    path: &Path,
    intervals: Option<&FxHashMap<String, Vec<(u64, u64)>>>,
    flank: usize,
) -> Result<Vec<ReferenceRegion>> {
    let mut reader = needletail::parse_fastx_file(path).map_err(|e| KestrelError::Parse {
        path: PathBuf::from(path),
        msg: e.to_string(),
    })?;

    let mut regions = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| KestrelError::Parse {
            path: PathBuf::from(path),
            msg: e.to_string(),
        })?;
        let id = String::from_utf8_lossy(record.id())
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string();
        let seq = record.seq();

        match intervals {
            None => {
                regions.push(ReferenceRegion::new(id, &seq, 0, seq.len(), 1)?);
            }
            Some(map) => {
                let Some(ivs) = map.get(&id) else { continue };
                for &(start, end) in ivs {
                    let start = start as usize;
                    let end = (end as usize).min(seq.len());
                    if start >= end {
                        continue;
                    }
                    let cut_start = start.saturating_sub(flank);
                    let cut_end = (end + flank).min(seq.len());
                    let region = ReferenceRegion::new(
                        id.clone(),
                        &seq[cut_start..cut_end],
                        start - cut_start,
                        end - cut_start,
                        cut_start as u64 + 1,
                    )?;
                    regions.push(region);
                }
            }
        }
    }
    debug!("loaded {} reference region(s) from {:?}", regions.len(), path);
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_indexes_ambiguity() {
        let r = ReferenceRegion::new("chr", b"acgtnNryACGT", 0, 12, 1).unwrap();
        assert_eq!(r.sequence(), b"ACGTNNRYACGT");
        assert_eq!(r.ambiguous_runs(), &[(4, 8)]);
        assert!(r.has_ambiguous(0, 5));
        assert!(r.has_ambiguous(7, 12));
        assert!(!r.has_ambiguous(0, 4));
        assert!(!r.has_ambiguous(8, 12));
    }

    #[test]
    fn rejects_gap_and_invalid_bytes() {
        assert!(matches!(
            ReferenceRegion::new("chr", b"ACG-T", 0, 5, 1),
            Err(KestrelError::GapInReference { pos: 3, .. })
        ));
        assert!(matches!(
            ReferenceRegion::new("chr", b"ACGXT", 0, 5, 1),
            Err(KestrelError::InvalidBase { pos: 3, byte: b'X', .. })
        ));
    }

    #[test]
    fn flank_accounting() {
        let r = ReferenceRegion::new("chr", b"AAACCCGGGTTT", 3, 9, 101).unwrap();
        assert!(r.in_flank(2));
        assert!(!r.in_flank(3));
        assert!(!r.in_flank(8));
        assert!(r.in_flank(9));
        assert_eq!(r.reference_position(3), 104);
    }
}
