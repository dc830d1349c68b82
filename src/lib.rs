//! Kestrel: mapping-free variant calling from k-mer frequencies.
//!
//! Given a reference sequence and the k-mer count spectrum of a sequenced
//! sample, Kestrel locates sub-intervals of the reference where sample
//! support collapses ("active regions"), rebuilds the sample haplotype over
//! each region by a k-mer-guided progressive alignment, and reports the
//! differences as variants.

pub mod active;
pub mod align;
pub mod cli;
pub mod counts;
pub mod error;
pub mod kmer;
pub mod pipeline;
pub mod region;
pub mod variant;
pub mod writer;

pub use error::KestrelError;
