pub mod map;
pub mod profile;

pub use map::{CountMap, InMemoryCountMap, KmerExtractionCounters, Sample};
pub use profile::CountProfile;
