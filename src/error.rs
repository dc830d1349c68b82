use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the calling core.
///
/// Configuration errors abort the run before any output; input-data errors
/// fail a single region; internal errors abort the run. Computation limits
/// (state cap, repeat cap, scan cap) are not errors and never surface here.
#[derive(Debug, Error)]
pub enum KestrelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid k-mer size {0}: must be between {min} and {max}", min = crate::kmer::MIN_KMER_SIZE, max = crate::kmer::MAX_KMER_SIZE)]
    InvalidKmerSize(usize),

    #[error("invalid base 0x{byte:02x} at position {pos} of sequence {name}")]
    InvalidBase { name: String, pos: usize, byte: u8 },

    #[error("gap character at position {pos} of sequence {name}")]
    GapInReference { name: String, pos: usize },

    #[error("k-mer size {k} exceeds region length {len}")]
    KmerSizeExceedsRegion { k: usize, len: usize },

    #[error("aligner used before init()")]
    InitRequired,

    #[error("consensus buffer would exceed {0} bases")]
    ConsensusLimit(usize),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("parsing {path}: {msg}")]
    Parse { path: PathBuf, msg: String },
}

impl KestrelError {
    /// Process exit code for the CLI driver.
    pub fn exit_code(&self) -> i32 {
        match self {
            KestrelError::Config(_) | KestrelError::InvalidKmerSize(_) => 2,
            KestrelError::Io { .. } | KestrelError::Parse { .. } | KestrelError::Stream(_) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, KestrelError>;
