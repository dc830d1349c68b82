//! Saved aligner states for branch exploration.
//!
//! When the k-mer walk branches, the aligner snapshots its matrix columns
//! (sparse, non-zero entries only), consensus length, running-maximum list,
//! and the walker's bookkeeping, then explores the best branch first. The
//! stack is a vector of slots threaded with prev/next indices: restores pop
//! from the top, while capacity eviction unlinks the shallowest-support
//! entry from anywhere in the middle in O(1).

use crate::align::trace::{MaxScoreList, NodeId};
use crate::kmer::Kmer;
use fxhash::FxHashSet;

const NIL: usize = usize::MAX;

/// Everything needed to resume the aligner and the k-mer walker at a
/// branch point.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    /// K-mer in play after taking this branch.
    pub kmer: Kmer,
    /// Base to replay through `add_base` on restore (ASCII).
    pub next_base: u8,
    pub consensus_len: usize,
    pub col_m: Vec<(u32, NodeId)>,
    pub col_ir: Vec<(u32, NodeId)>,
    pub col_ic: Vec<(u32, NodeId)>,
    pub max_list: MaxScoreList,
    pub visited: FxHashSet<Kmer>,
    pub repeat_count: u32,
    /// Support depth of the branch; eviction removes the smallest.
    pub min_depth: u32,
}

#[derive(Debug)]
struct Slot {
    snap: StateSnapshot,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
pub struct StateStack {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    top: usize,
    len: usize,
    capacity: usize,
}

impl StateStack {
    pub fn new(capacity: usize) -> StateStack {
        StateStack {
            slots: Vec::new(),
            free: Vec::new(),
            top: NIL,
            len: 0,
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.top = NIL;
        self.len = 0;
    }

    /// Push a snapshot on top. Callers must make room first when full.
    pub fn push(&mut self, snap: StateSnapshot) {
        debug_assert!(!self.is_full());
        let slot = Slot {
            snap,
            prev: NIL,
            next: self.top,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(slot);
                idx
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        if self.top != NIL {
            self.slots[self.top].as_mut().expect("linked slot").prev = idx;
        }
        self.top = idx;
        self.len += 1;
    }

    /// Pop the most recently saved snapshot.
    pub fn pop(&mut self) -> Option<StateSnapshot> {
        if self.top == NIL {
            return None;
        }
        Some(self.unlink(self.top))
    }

    /// Unlink the entry with the smallest `min_depth` strictly below
    /// `new_min_depth`; returns false when every held entry is at least as
    /// deep (the caller then rejects the save).
    pub fn evict_min_below(&mut self, new_min_depth: u32) -> bool {
        let mut victim = NIL;
        let mut victim_depth = new_min_depth;
        let mut cur = self.top;
        while cur != NIL {
            let slot = self.slots[cur].as_ref().expect("linked slot");
            if slot.snap.min_depth < victim_depth {
                victim = cur;
                victim_depth = slot.snap.min_depth;
            }
            cur = slot.next;
        }
        if victim == NIL {
            return false;
        }
        self.unlink(victim);
        true
    }

    fn unlink(&mut self, idx: usize) -> StateSnapshot {
        let slot = self.slots[idx].take().expect("occupied slot");
        if slot.prev != NIL {
            self.slots[slot.prev].as_mut().expect("linked slot").next = slot.next;
        } else {
            self.top = slot.next;
        }
        if slot.next != NIL {
            self.slots[slot.next].as_mut().expect("linked slot").prev = slot.prev;
        }
        self.free.push(idx);
        self.len -= 1;
        slot.snap
    }
}
