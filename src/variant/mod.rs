pub mod call;
pub mod caller;
pub mod filter;

pub use call::{VariantCall, VariantKind};
pub use caller::{CallerParams, VariantCaller};
pub use filter::{parse_filter_spec, FilterChain, VariantFilter};
