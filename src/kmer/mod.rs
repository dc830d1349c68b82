pub mod base;
pub mod util;

pub use base::{complement, is_canonical, is_iupac, normalize, BaseCode, AMBIGUOUS, INVALID};
pub use util::{Kmer, KmerUtil, MAX_KMER_SIZE, MIN_KMER_SIZE, WORD_SIZE};
