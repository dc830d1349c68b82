//! Interval file parsing.

use crate::error::{KestrelError, Result};
use fxhash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read calling intervals from a BED file into a per-sequence map.
///
/// Only the name/start/end columns matter; extra BED fields are ignored.
/// Header lines (`#`, `track`, `browser`) and blanks are skipped, a line
/// whose coordinates do not parse fails with its line number, and spans
/// that touch or overlap are coalesced so every reference base is called
/// at most once.
pub fn load_intervals(bed: &Path) -> Result<FxHashMap<String, Vec<(u64, u64)>>> {
    let file = File::open(bed).map_err(|e| KestrelError::Io {
        path: bed.to_path_buf(),
        source: e,
    })?;
    let mut map: FxHashMap<String, Vec<(u64, u64)>> = FxHashMap::default();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| KestrelError::Io {
            path: bed.to_path_buf(),
            source: e,
        })?;
        let mut fields = line.split_ascii_whitespace();
        let name = match fields.next() {
            Some(f) if !f.starts_with('#') && f != "track" && f != "browser" => f,
            _ => continue,
        };
        let span = fields
            .next()
            .zip(fields.next())
            .and_then(|(s, e)| Some((s.parse::<u64>().ok()?, e.parse::<u64>().ok()?)));
        let Some((start, end)) = span else {
            return Err(KestrelError::Parse {
                path: bed.to_path_buf(),
                msg: format!("line {}: expected <name> <start> <end>", lineno + 1),
            });
        };
        // zero-length and inverted spans carry no callable bases
        if end > start {
            map.entry(name.to_string()).or_default().push((start, end));
        }
    }
    for spans in map.values_mut() {
        coalesce(spans);
    }
    Ok(map)
}

/// Sort half-open spans and fuse any that touch or overlap, compacting the
/// vector in place behind a write cursor.
fn coalesce(spans: &mut Vec<(u64, u64)>) {
    spans.sort_unstable();
    let mut keep = 0;
    for read in 1..spans.len() {
        let (start, end) = spans[read];
        if start <= spans[keep].1 {
            // extends (or sits inside) the span under the cursor
            spans[keep].1 = spans[keep].1.max(end);
        } else {
            keep += 1;
            spans[keep] = (start, end);
        }
    }
    spans.truncate(keep + 1);
}
