pub mod counters;
pub mod detector;
pub mod stats;

pub use counters::DetectorCounters;
pub use detector::{
    ActiveRegion, ActiveRegionContainer, ActiveRegionDetector, DetectorParams, RegionHaplotypes,
    RegionResolver,
};
pub use stats::RegionStats;
