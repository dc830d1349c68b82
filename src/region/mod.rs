pub mod bed;
pub mod reference;

pub use bed::load_intervals;
pub use reference::{load_reference_regions, ReferenceRegion};
