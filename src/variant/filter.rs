//! Variant filter chain.
//!
//! Filters are tagged variants selected by configuration strings at
//! startup (`depth:<n>`, `type:snp,ins`). A chain applies them in order;
//! the first filter returning `None` drops the variant.

use crate::error::{KestrelError, Result};
use crate::variant::call::{VariantCall, VariantKind};
use log::trace;

pub trait VariantFilter {
    fn filter(&self, v: VariantCall) -> Option<VariantCall>;
    fn name(&self) -> &'static str;
}

#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn VariantFilter>>,
}

impl FilterChain {
    pub fn new() -> FilterChain {
        FilterChain::default()
    }

    pub fn push(&mut self, filter: Box<dyn VariantFilter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, mut v: VariantCall) -> Option<VariantCall> {
        for f in &self.filters {
            match f.filter(v) {
                Some(kept) => v = kept,
                None => {
                    trace!("variant dropped by {} filter", f.name());
                    return None;
                }
            }
        }
        Some(v)
    }
}

/// Drop variants whose supporting k-mer depth is below a floor.
pub struct DepthFilter {
    min_depth: u32,
}

impl VariantFilter for DepthFilter {
    fn filter(&self, v: VariantCall) -> Option<VariantCall> {
        (v.depth >= self.min_depth).then_some(v)
    }

    fn name(&self) -> &'static str {
        "depth"
    }
}

/// Keep only the listed variant types.
pub struct KindFilter {
    keep: Vec<VariantKind>,
}

impl VariantFilter for KindFilter {
    fn filter(&self, v: VariantCall) -> Option<VariantCall> {
        self.keep.contains(&v.kind).then_some(v)
    }

    fn name(&self) -> &'static str {
        "type"
    }
}

/// Parse one `name:args` filter specification.
pub fn parse_filter_spec(spec: &str) -> Result<Box<dyn VariantFilter>> {
    let (name, args) = spec.split_once(':').unwrap_or((spec, ""));
    match name {
        "depth" => {
            let min_depth: u32 = args.parse().map_err(|_| {
                KestrelError::Config(format!("depth filter needs an integer, got {args:?}"))
            })?;
            Ok(Box::new(DepthFilter { min_depth }))
        }
        "type" => {
            let mut keep = Vec::new();
            for part in args.split(',').filter(|p| !p.is_empty()) {
                keep.push(match part.to_ascii_lowercase().as_str() {
                    "snp" => VariantKind::Snp,
                    "ins" => VariantKind::Ins,
                    "del" => VariantKind::Del,
                    other => {
                        return Err(KestrelError::Config(format!(
                            "unknown variant type {other:?} in type filter"
                        )))
                    }
                });
            }
            if keep.is_empty() {
                return Err(KestrelError::Config(
                    "type filter keeps no variant types".into(),
                ));
            }
            Ok(Box::new(KindFilter { keep }))
        }
        other => Err(KestrelError::Config(format!(
            "unknown variant filter {other:?}"
        ))),
    }
}
