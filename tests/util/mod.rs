//! Shared scaffolding for integration tests.
//!
//! Synthetic references are built over the {A, C, G} alphabet with every
//! k-mer distinct, so a variant can introduce `T` bases whose k-mers are
//! guaranteed not to collide with any reference k-mer. Count maps are
//! filled directly from sequences at a chosen multiplicity.

#![allow(dead_code)]

use kestrel::counts::map::{CountMap, InMemoryCountMap};
use kestrel::kmer::KmerUtil;
use std::collections::HashSet;

/// Deterministic sequence over {A, C, G} whose k-mers are all distinct.
/// Backtracking search; the three-letter de Bruijn graph guarantees a
/// solution for any length this test suite asks for.
pub fn unique_seq(len: usize, k: usize) -> Vec<u8> {
    fn extend(seq: &mut Vec<u8>, seen: &mut HashSet<Vec<u8>>, len: usize, k: usize) -> bool {
        if seq.len() == len {
            return true;
        }
        for &b in b"ACG" {
            seq.push(b);
            if seq.len() < k {
                if extend(seq, seen, len, k) {
                    return true;
                }
                seq.pop();
                continue;
            }
            let window = seq[seq.len() - k..].to_vec();
            if !seen.contains(&window) {
                seen.insert(window.clone());
                if extend(seq, seen, len, k) {
                    return true;
                }
                seen.remove(&window);
            }
            seq.pop();
        }
        false
    }
    let mut seq = Vec::with_capacity(len);
    let mut seen = HashSet::new();
    assert!(extend(&mut seq, &mut seen, len, k), "no unique sequence");
    seq
}

/// Add every k-mer of `seq` to the map at the given multiplicity.
pub fn count_sequence(map: &mut InMemoryCountMap, seq: &[u8], times: u32) {
    let kutil = map.k_util().clone();
    for window in seq.windows(kutil.k()) {
        if let Some(kmer) = kutil.from_bytes(window) {
            map.insert(kmer, times);
        }
    }
}

/// Fresh count map over the k-mers of the given sequences.
pub fn map_from(k: usize, seqs: &[&[u8]], times: u32) -> InMemoryCountMap {
    let mut map = InMemoryCountMap::new(KmerUtil::new(k).unwrap());
    for seq in seqs {
        count_sequence(&mut map, seq, times);
    }
    map
}
