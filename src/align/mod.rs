pub mod aligner;
pub mod builder;
pub mod haplotype;
pub mod state;
pub mod trace;
pub mod weight;

pub use aligner::{KmerAligner, SaveOutcome};
pub use builder::KmerAlignmentBuilder;
pub use haplotype::{AlignKind, Haplotype};
pub use trace::{NodeId, TraceArena, TraceKind, ZERO_NODE};
pub use weight::AlignmentWeight;
