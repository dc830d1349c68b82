//! K-mer-guided progressive alignment.
//!
//! A local affine-gap dynamic-programming matrix between the reference
//! slice of an active region and a consensus sequence grown one base at a
//! time. Only two columns live at once (current and next, swapped per
//! step); entries are trace-arena ids so tied predecessors can branch
//! without reference counting. For left-open regions the reference slice is
//! reversed and the consensus grows right-to-left in reference space; the
//! materialized haplotypes are flipped back to canonical orientation.

use crate::active::detector::ActiveRegion;
use crate::active::stats::RegionStats;
use crate::align::haplotype::{push_run, AlignKind, AlignOps, Haplotype};
use crate::align::state::{StateSnapshot, StateStack};
use crate::align::trace::{
    MaxScoreList, NodeId, TraceArena, TraceKind, TraceMatrix, ZERO_NODE,
};
use crate::align::weight::AlignmentWeight;
use crate::counts::map::{depth, CountMap};
use crate::error::{KestrelError, Result};
use crate::kmer::{Kmer, KmerUtil};
use fxhash::FxHashSet;
use log::trace;
use std::sync::Arc;

/// Hard cap on consensus growth; a path that wants more is broken.
const MAX_CONSENSUS: usize = 1 << 20;

/// Result of asking the aligner to remember a branch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The stack was full of deeper branches; the caller abandons this one.
    Rejected,
}

/// Walker state handed back by a successful restore.
#[derive(Debug)]
pub struct RestoredPath {
    pub kmer: Kmer,
    pub visited: FxHashSet<Kmer>,
    pub repeat_count: u32,
    /// Hint from replaying the saved base; false means this branch cannot
    /// beat the running maximum either.
    pub continue_hint: bool,
}

/// Harvested (consensus, score, alignments) in working orientation.
#[derive(Debug)]
struct Proto {
    consensus: Vec<u8>,
    score: f32,
    alignments: Vec<AlignOps>,
}

pub struct KmerAligner {
    weights: AlignmentWeight,
    kutil: KmerUtil,
    max_haplotypes: usize,
    trace_enabled: bool,

    region: Option<Arc<ActiveRegion>>,
    /// Reference slice in working orientation (reversed for left-open).
    ref_work: Vec<u8>,
    reversed: bool,
    allow_end_deletion: bool,

    // current and next columns; entries are arena ids, ZERO_NODE when dead
    col_m: Vec<NodeId>,
    col_ir: Vec<NodeId>,
    col_ic: Vec<NodeId>,
    next_m: Vec<NodeId>,
    next_ir: Vec<NodeId>,
    next_ic: Vec<NodeId>,

    arena: TraceArena,
    consensus: Vec<u8>,
    max_list: MaxScoreList,
    stack: StateStack,
    harvested: Vec<Proto>,
    trace_log: TraceMatrix,
}

impl KmerAligner {
    pub fn new(
        weights: AlignmentWeight,
        kutil: KmerUtil,
        max_states: usize,
        max_haplotypes: usize,
        trace_enabled: bool,
    ) -> KmerAligner {
        KmerAligner {
            weights,
            kutil,
            max_haplotypes,
            trace_enabled,
            region: None,
            ref_work: Vec::new(),
            reversed: false,
            allow_end_deletion: false,
            col_m: Vec::new(),
            col_ir: Vec::new(),
            col_ic: Vec::new(),
            next_m: Vec::new(),
            next_ir: Vec::new(),
            next_ic: Vec::new(),
            arena: TraceArena::new(),
            consensus: Vec::new(),
            max_list: MaxScoreList::default(),
            stack: StateStack::new(max_states),
            harvested: Vec::new(),
            trace_log: TraceMatrix::default(),
        }
    }

    #[inline]
    pub fn consensus_len(&self) -> usize {
        self.consensus.len()
    }

    #[inline]
    pub fn max_score(&self) -> f32 {
        self.max_list.score
    }

    #[inline]
    pub fn saved_states(&self) -> usize {
        self.stack.len()
    }

    /// Prepare the matrix for one active region: seed the anchor k-mer as
    /// k matches at the initial score and open the gap-in-consensus lane
    /// behind it.
    pub fn init(&mut self, region: &Arc<ActiveRegion>) {
        let k = self.kutil.k();
        let slice = region.ref_slice();
        self.reversed = region.left_end();
        self.ref_work.clear();
        if self.reversed {
            self.ref_work.extend(slice.iter().rev().copied());
        } else {
            self.ref_work.extend_from_slice(slice);
        }
        self.allow_end_deletion = region.left_end() || region.right_end();
        let l = self.ref_work.len();
        debug_assert!(l >= k);

        for col in [
            &mut self.col_m,
            &mut self.col_ir,
            &mut self.col_ic,
            &mut self.next_m,
            &mut self.next_ir,
            &mut self.next_ic,
        ] {
            col.clear();
            col.resize(l, ZERO_NODE);
        }
        self.arena.clear();
        self.consensus.clear();
        self.max_list.clear();
        self.stack.clear();
        self.harvested.clear();
        self.trace_log.steps.clear();
        self.region = Some(Arc::clone(region));

        // anchor chain: k matches totalling the initial score
        let s0 = self.weights.initial_score(k);
        let mut prev = ZERO_NODE;
        for t in 0..k {
            let score = s0 - (k - 1 - t) as f32 * self.weights.match_score;
            prev = self.arena.alloc(score, TraceKind::Match, prev);
        }
        self.col_m[k - 1] = prev;
        self.consensus.extend_from_slice(&self.ref_work[..k]);

        // deletions opening immediately behind the anchor
        let mut g = s0 + self.weights.new_gap();
        let mut prev_ic = prev;
        let mut row = k;
        while row < l && g > 0.0 {
            let node = self.arena.alloc(g, TraceKind::GapCon, prev_ic);
            self.col_ic[row] = node;
            prev_ic = node;
            g += self.weights.gap_extend;
            row += 1;
        }

        // a minimal region can already close on the anchor alone
        if k == l {
            self.max_list.offer(self.col_m[l - 1], k, s0);
        } else if self.allow_end_deletion && self.col_ic[l - 1] != ZERO_NODE {
            self.max_list
                .offer(self.col_ic[l - 1], k, self.arena.score(self.col_ic[l - 1]));
        }
    }

    /// Extend the consensus by one base (ASCII) and advance the matrix one
    /// column. Returns false when no extension of any current cell can
    /// reach the running maximum score again.
    pub fn add_base(&mut self, base: u8) -> Result<bool> {
        if self.region.is_none() {
            return Err(KestrelError::InitRequired);
        }
        if self.consensus.len() >= MAX_CONSENSUS {
            return Err(KestrelError::ConsensusLimit(MAX_CONSENSUS));
        }
        self.consensus.push(base);
        let l = self.ref_work.len();
        let new_gap = self.weights.new_gap();
        let gap_extend = self.weights.gap_extend;

        // align lane: diagonal moves from the previous column
        self.next_m[0] = ZERO_NODE;
        for i in 1..l {
            let s = self.weights.score(base, self.ref_work[i]);
            let kind = if base == self.ref_work[i] {
                TraceKind::Match
            } else {
                TraceKind::Mismatch
            };
            let cands = [
                (self.col_m[i - 1], self.arena.score(self.col_m[i - 1]) + s),
                (self.col_ir[i - 1], self.arena.score(self.col_ir[i - 1]) + s),
                (self.col_ic[i - 1], self.arena.score(self.col_ic[i - 1]) + s),
            ];
            let cell = self.combine(kind, cands);
            self.next_m[i] = cell;
        }

        // gap-in-reference lane: horizontal moves, consensus-only
        for i in 0..l {
            let cands = [
                (self.col_m[i], self.arena.score(self.col_m[i]) + new_gap),
                (self.col_ir[i], self.arena.score(self.col_ir[i]) + gap_extend),
                (self.col_ic[i], self.arena.score(self.col_ic[i]) + new_gap),
            ];
            let cell = self.combine(TraceKind::GapRef, cands);
            self.next_ir[i] = cell;
        }

        // gap-in-consensus lane: vertical moves within the next column,
        // so rows fill in ascending order after the other two lanes
        self.next_ic[0] = ZERO_NODE;
        for i in 1..l {
            let cands = [
                (self.next_m[i - 1], self.arena.score(self.next_m[i - 1]) + new_gap),
                (self.next_ir[i - 1], self.arena.score(self.next_ir[i - 1]) + new_gap),
                (self.next_ic[i - 1], self.arena.score(self.next_ic[i - 1]) + gap_extend),
            ];
            let cell = self.combine(TraceKind::GapCon, cands);
            self.next_ic[i] = cell;
        }

        // alignment ends: reference fully consumed
        if self.next_m[l - 1] != ZERO_NODE {
            self.max_list.offer(
                self.next_m[l - 1],
                self.consensus.len(),
                self.arena.score(self.next_m[l - 1]),
            );
        }
        if self.allow_end_deletion && self.next_ic[l - 1] != ZERO_NODE {
            self.max_list.offer(
                self.next_ic[l - 1],
                self.consensus.len(),
                self.arena.score(self.next_ic[l - 1]),
            );
        }

        // best-case extrapolation: any live cell plus matches to the end
        let mut max_potential = 0.0f32;
        for i in 0..l {
            let remaining = (l - 1 - i) as f32 * self.weights.match_score;
            for col in [&self.next_m, &self.next_ir, &self.next_ic] {
                if col[i] != ZERO_NODE {
                    let p = self.arena.score(col[i]) + remaining;
                    if p > max_potential {
                        max_potential = p;
                    }
                }
            }
        }

        if self.trace_enabled {
            let step: Vec<(u32, f32)> = (0..l)
                .filter(|&i| self.next_m[i] != ZERO_NODE)
                .map(|i| (i as u32, self.arena.score(self.next_m[i])))
                .collect();
            self.trace_log.steps.push(step);
        }

        std::mem::swap(&mut self.col_m, &mut self.next_m);
        std::mem::swap(&mut self.col_ir, &mut self.next_ir);
        std::mem::swap(&mut self.col_ic, &mut self.next_ic);

        Ok(max_potential >= self.max_list.score && max_potential > 0.0)
    }

    /// Allocate a cell from up to three scored predecessors. The first
    /// predecessor reaching the best score becomes `back`; later ties are
    /// chained through `branch`. Dead unless the score is positive.
    fn combine(&mut self, kind: TraceKind, cands: [(NodeId, f32); 3]) -> NodeId {
        let mut best = 0.0f32;
        for &(pred, score) in &cands {
            if pred != ZERO_NODE && score > best {
                best = score;
            }
        }
        if best <= 0.0 {
            return ZERO_NODE;
        }
        let mut primary = ZERO_NODE;
        for &(pred, score) in &cands {
            if pred != ZERO_NODE && score == best {
                let node = self.arena.alloc(best, kind, pred);
                if primary == ZERO_NODE {
                    primary = node;
                } else {
                    self.arena.chain_branch(primary, node);
                }
            }
        }
        primary
    }

    /* ---- state save / restore -------------------------------------- */

    /// Snapshot the current matrix and walker state for a branch that will
    /// be explored later. A full stack evicts its shallowest-support entry
    /// when that entry is shallower than the new branch; otherwise the
    /// save is rejected.
    pub fn save_state(
        &mut self,
        next_kmer: Kmer,
        next_base: u8,
        min_depth: u32,
        visited: &FxHashSet<Kmer>,
        repeat_count: u32,
    ) -> SaveOutcome {
        if self.stack.is_full() && !self.stack.evict_min_below(min_depth) {
            return SaveOutcome::Rejected;
        }
        self.stack.push(StateSnapshot {
            kmer: next_kmer,
            next_base,
            consensus_len: self.consensus.len(),
            col_m: sparse(&self.col_m),
            col_ir: sparse(&self.col_ir),
            col_ic: sparse(&self.col_ic),
            max_list: self.max_list.clone(),
            visited: visited.clone(),
            repeat_count,
            min_depth,
        });
        SaveOutcome::Saved
    }

    /// Pop the most recent branch point, rebuild the matrix from it, and
    /// replay its pending base. Haplotypes whose consensus extends past the
    /// truncation point are harvested first.
    pub fn restore_state(&mut self) -> Result<Option<RestoredPath>> {
        let Some(snap) = self.stack.pop() else {
            return Ok(None);
        };
        self.harvest()?;

        self.consensus.truncate(snap.consensus_len);
        let k = self.kutil.k();
        if self.trace_enabled {
            self.trace_log.steps.truncate(snap.consensus_len - k);
        }
        scatter(&mut self.col_m, &snap.col_m);
        scatter(&mut self.col_ir, &snap.col_ir);
        scatter(&mut self.col_ic, &snap.col_ic);
        self.max_list = snap.max_list;

        let continue_hint = self.add_base(snap.next_base)?;
        Ok(Some(RestoredPath {
            kmer: snap.kmer,
            visited: snap.visited,
            repeat_count: snap.repeat_count,
            continue_hint,
        }))
    }

    /* ---- haplotype materialization ---------------------------------- */

    /// Enumerate alignments for every unbuilt max-score entry against the
    /// current consensus. Entries failing the far-anchor check are dropped.
    pub fn harvest(&mut self) -> Result<()> {
        let k = self.kutil.k();
        let l = self.ref_work.len();
        let cap = self.max_haplotypes;
        let mut pending: Vec<(NodeId, usize)> = Vec::new();
        for entry in self.max_list.entries.iter_mut() {
            if !entry.built {
                entry.built = true;
                pending.push((entry.node, entry.consensus_len));
            }
        }
        for (node, consensus_len) in pending {
            let cons = &self.consensus[..consensus_len];
            // the alignment must close on the far anchor unless the region
            // is open on one end
            if !self.allow_end_deletion {
                if consensus_len < k || cons[consensus_len - k..] != self.ref_work[l - k..] {
                    trace!("dropping max-score node that misses the far anchor");
                    continue;
                }
            }
            if self.harvested.len() >= cap {
                trace!("haplotype cap {} reached; dropping further paths", cap);
                break;
            }
            let alignments = self.enumerate(node, cap);
            if alignments.is_empty() {
                continue;
            }
            self.harvested.push(Proto {
                consensus: cons.to_vec(),
                score: self.max_list.score,
                alignments,
            });
        }
        Ok(())
    }

    /// Walk `back` pointers from an alignment end to the origin, forking at
    /// every `branch`, and return the run-length encoded paths. Paths share
    /// their tails through a persistent op arena, so memory stays
    /// proportional to distinct events rather than paths × events.
    fn enumerate(&self, end: NodeId, cap: usize) -> Vec<AlignOps> {
        // persistent run-length list: (kind, run, next)
        struct Op {
            kind: AlignKind,
            n: u32,
            next: u32,
        }
        const NIL: u32 = u32::MAX;
        let mut ops: Vec<Op> = Vec::new();
        let mut out: Vec<AlignOps> = Vec::new();
        let mut work: Vec<(NodeId, u32)> = vec![(end, NIL)];

        while let Some((mut node_id, mut head)) = work.pop() {
            loop {
                if node_id == ZERO_NODE {
                    // reached the origin: materialize in forward order
                    let mut path = AlignOps::new();
                    let mut cur = head;
                    while cur != NIL {
                        let op = &ops[cur as usize];
                        push_run(&mut path, op.kind, op.n);
                        cur = op.next;
                    }
                    out.push(path);
                    break;
                }
                let node = self.arena.get(node_id);
                if node.branch != ZERO_NODE && work.len() + out.len() < cap {
                    work.push((node.branch, head));
                }
                let kind = match node.kind {
                    TraceKind::Match => AlignKind::Match,
                    TraceKind::Mismatch => AlignKind::Mismatch,
                    TraceKind::GapRef => AlignKind::Ins,
                    TraceKind::GapCon => AlignKind::Del,
                };
                // extend the head, sharing the tail with sibling paths
                let id = ops.len() as u32;
                match head {
                    h if h != NIL && ops[h as usize].kind == kind => {
                        ops.push(Op {
                            kind,
                            n: ops[h as usize].n + 1,
                            next: ops[h as usize].next,
                        });
                    }
                    _ => ops.push(Op {
                        kind,
                        n: 1,
                        next: head,
                    }),
                }
                head = id;
                node_id = node.back;
            }
            if out.len() >= cap {
                break;
            }
        }
        out
    }

    /// Finish the region: harvest what remains, flip to canonical
    /// orientation, merge identical consensus sequences, attach k-mer
    /// statistics, and emit at most `max_haplotypes` haplotypes ordered by
    /// score then sequence.
    pub fn take_haplotypes(
        &mut self,
        counts: &dyn CountMap,
        count_reverse: bool,
    ) -> Result<Vec<Haplotype>> {
        self.harvest()?;
        let region = self
            .region
            .clone()
            .ok_or(KestrelError::InitRequired)?;
        let k = self.kutil.k();
        let trace_shared = if self.trace_enabled {
            Some(Arc::new(self.trace_log.clone()))
        } else {
            None
        };

        // canonical orientation, merged by consensus
        let mut merged: Vec<(Vec<u8>, f32, Vec<AlignOps>)> = Vec::new();
        for proto in self.harvested.drain(..) {
            let (consensus, alignments) = if self.reversed {
                let consensus: Vec<u8> = proto.consensus.iter().rev().copied().collect();
                let alignments = proto
                    .alignments
                    .into_iter()
                    .map(|a| reverse_ops(&a))
                    .collect();
                (consensus, alignments)
            } else {
                (proto.consensus, proto.alignments)
            };
            match merged.iter_mut().find(|(c, _, _)| *c == consensus) {
                Some((_, score, aligns)) => {
                    *score = score.max(proto.score);
                    for a in alignments {
                        if !aligns.contains(&a) {
                            aligns.push(a);
                        }
                    }
                }
                None => merged.push((consensus, proto.score, alignments)),
            }
        }

        let mut haplotypes: Vec<Haplotype> = merged
            .into_iter()
            .map(|(consensus, score, alignments)| {
                let stats = consensus_stats(&consensus, counts, count_reverse, k);
                Haplotype::new(
                    consensus,
                    Arc::clone(&region),
                    alignments,
                    score,
                    stats,
                    trace_shared.clone(),
                )
            })
            .collect();
        haplotypes.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| a.consensus().cmp(b.consensus()))
        });
        haplotypes.truncate(self.max_haplotypes);
        Ok(haplotypes)
    }
}

/* ---------- helpers -------------------------------------------------- */

fn sparse(col: &[NodeId]) -> Vec<(u32, NodeId)> {
    col.iter()
        .enumerate()
        .filter(|&(_, &n)| n != ZERO_NODE)
        .map(|(i, &n)| (i as u32, n))
        .collect()
}

fn scatter(col: &mut [NodeId], entries: &[(u32, NodeId)]) {
    col.fill(ZERO_NODE);
    for &(i, n) in entries {
        col[i as usize] = n;
    }
}

/// Flip an operation list into the opposite reference orientation.
fn reverse_ops(ops: &AlignOps) -> AlignOps {
    let mut out = AlignOps::with_capacity(ops.len());
    for &(kind, n) in ops.iter().rev() {
        push_run(&mut out, kind, n);
    }
    out
}

/// Count statistics over a consensus sequence's own k-mers.
fn consensus_stats(
    consensus: &[u8],
    counts: &dyn CountMap,
    count_reverse: bool,
    k: usize,
) -> RegionStats {
    let kutil = counts.k_util();
    if consensus.len() < k {
        return RegionStats::from_counts(&[]);
    }
    let depths: Vec<u32> = consensus
        .windows(k)
        .filter_map(|w| kutil.from_bytes(w))
        .map(|kmer| depth(counts, &kmer, count_reverse))
        .collect();
    RegionStats::from_counts(&depths)
}
