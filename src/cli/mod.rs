pub mod opts;

pub use opts::{DetectorArgs, IoArgs, KmerArgs, OutputArgs, OutputFormat, RegionArgs, WeightArgs};
