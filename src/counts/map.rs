//! Sample k-mer counts.
//!
//! [`CountMap`] is the contract the calling core consumes: load a sample,
//! query exact k-mer counts, release the storage. The in-memory
//! implementation streams FASTA/FASTQ records (gzip transparent via
//! needletail) and counts k-mers into minimizer-sharded hash maps; batches
//! of reads are counted on the rayon pool and merged shard-wise. Threads
//! quiesce before `set` returns, so queries never race the load.

use crate::error::{KestrelError, Result};
use crate::kmer::{base, Kmer, KmerUtil};
use fxhash::FxHashMap;
use log::{debug, info};
use rayon::prelude::*;
use std::path::PathBuf;

/// Number of shard maps; keys are distributed by minimizer subword.
const SHARD_COUNT: usize = 64;
/// Reads per parallel flush.
const BATCH_RECORDS: usize = 8192;
/// Reads per rayon work item within a batch.
const CHUNK_RECORDS: usize = 256;

/// One sequenced sample: a name and its read files.
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// Tallies from one sample load.
#[derive(Debug, Default, Clone, Copy)]
pub struct KmerExtractionCounters {
    pub total: u64,
    pub ambiguous: u64,
    pub counted: u64,
}

impl std::ops::AddAssign for KmerExtractionCounters {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.ambiguous += other.ambiguous;
        self.counted += other.counted;
    }
}

/// Count-map contract consumed by the core.
pub trait CountMap {
    /// Load counts for a sample; may block on I/O.
    fn set(&mut self, sample: &Sample) -> Result<()>;
    /// Count of one k-mer; pure after `set`.
    fn get(&self, kmer: &Kmer) -> u32;
    /// Release backing storage.
    fn free(&mut self);
    /// Shared k-mer configuration.
    fn k_util(&self) -> &KmerUtil;
}

pub struct InMemoryCountMap {
    kutil: KmerUtil,
    shards: Vec<FxHashMap<Kmer, u32>>,
    counters: KmerExtractionCounters,
}

impl InMemoryCountMap {
    pub fn new(kutil: KmerUtil) -> Self {
        InMemoryCountMap {
            kutil,
            shards: (0..SHARD_COUNT).map(|_| FxHashMap::default()).collect(),
            counters: KmerExtractionCounters::default(),
        }
    }

    pub fn counters(&self) -> KmerExtractionCounters {
        self.counters
    }

    /// Number of distinct k-mers held.
    pub fn distinct(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    /// Insert a count directly. Test scaffolding and tiny references.
    pub fn insert(&mut self, kmer: Kmer, count: u32) {
        let shard = self.shard_of(&kmer);
        *self.shards[shard].entry(kmer).or_insert(0) += count;
    }

    #[inline]
    fn shard_of(&self, kmer: &Kmer) -> usize {
        (self.kutil.shard_key(kmer) % SHARD_COUNT as u64) as usize
    }

    fn flush_batch(&mut self, batch: &[Vec<u8>]) {
        let kutil = &self.kutil;
        let (locals, tally) = batch
            .par_chunks(CHUNK_RECORDS)
            .map(|chunk| count_chunk(kutil, chunk))
            .reduce(
                || (empty_shards(), KmerExtractionCounters::default()),
                |(mut a, mut ca), (b, cb)| {
                    merge_shards(&mut a, b);
                    ca += cb;
                    (a, ca)
                },
            );
        for (dst, src) in self.shards.iter_mut().zip(locals) {
            for (kmer, n) in src {
                *dst.entry(kmer).or_insert(0) += n;
            }
        }
        self.counters += tally;
    }
}

fn empty_shards() -> Vec<FxHashMap<Kmer, u32>> {
    (0..SHARD_COUNT).map(|_| FxHashMap::default()).collect()
}

fn merge_shards(dst: &mut [FxHashMap<Kmer, u32>], src: Vec<FxHashMap<Kmer, u32>>) {
    for (d, s) in dst.iter_mut().zip(src) {
        if d.is_empty() {
            *d = s;
            continue;
        }
        for (kmer, n) in s {
            *d.entry(kmer).or_insert(0) += n;
        }
    }
}

/// Count every k-mer of every read in `chunk` into fresh shard maps.
fn count_chunk(
    kutil: &KmerUtil,
    chunk: &[Vec<u8>],
) -> (Vec<FxHashMap<Kmer, u32>>, KmerExtractionCounters) {
    let k = kutil.k();
    let mut shards = empty_shards();
    let mut tally = KmerExtractionCounters::default();
    for seq in chunk {
        if seq.len() < k {
            continue;
        }
        tally.total += (seq.len() - k + 1) as u64;
        let mut kmer = kutil.empty();
        let mut loaded = 0usize;
        for &b in seq {
            let code = base::code(b);
            if code >= 4 {
                // restart accumulation after the ambiguous base
                loaded = 0;
                tally.ambiguous += 1;
                continue;
            }
            kutil.append(&mut kmer, code);
            loaded += 1;
            if loaded >= k {
                let shard = (kutil.shard_key(&kmer) % SHARD_COUNT as u64) as usize;
                *shards[shard].entry(kmer.clone()).or_insert(0) += 1;
                tally.counted += 1;
            }
        }
    }
    (shards, tally)
}

impl CountMap for InMemoryCountMap {
    fn set(&mut self, sample: &Sample) -> Result<()> {
        info!("loading k-mer counts for sample {}", sample.name);
        for path in &sample.files {
            let mut reader =
                needletail::parse_fastx_file(path).map_err(|e| KestrelError::Parse {
                    path: path.clone(),
                    msg: e.to_string(),
                })?;
            let mut batch: Vec<Vec<u8>> = Vec::with_capacity(BATCH_RECORDS);
            while let Some(record) = reader.next() {
                let record = record.map_err(|e| KestrelError::Parse {
                    path: path.clone(),
                    msg: e.to_string(),
                })?;
                batch.push(record.seq().into_owned());
                if batch.len() == BATCH_RECORDS {
                    self.flush_batch(&batch);
                    batch.clear();
                }
            }
            if !batch.is_empty() {
                self.flush_batch(&batch);
            }
            debug!("counted {:?}: {:?}", path, self.counters);
        }
        info!(
            "sample {}: {} distinct k-mers ({} counted, {} ambiguous skips)",
            sample.name,
            self.distinct(),
            self.counters.counted,
            self.counters.ambiguous
        );
        Ok(())
    }

    #[inline]
    fn get(&self, kmer: &Kmer) -> u32 {
        let shard = self.shard_of(kmer);
        self.shards[shard].get(kmer).copied().unwrap_or(0)
    }

    fn free(&mut self) {
        self.shards = empty_shards();
        self.shards.shrink_to_fit();
    }

    fn k_util(&self) -> &KmerUtil {
        &self.kutil
    }
}

/// Forward count plus, when enabled, the reverse-complement count.
#[inline]
pub fn depth(counts: &dyn CountMap, kmer: &Kmer, count_reverse: bool) -> u32 {
    let fwd = counts.get(kmer);
    if count_reverse {
        let rc = counts.k_util().reverse_complement(kmer);
        fwd.saturating_add(counts.get(&rc))
    } else {
        fwd
    }
}
