//! # Kernel Catalog
//!
//! Immutable, key-ordered table of GEMM strategies.
//!
//! - **[`selector`]:** hardware/precision/layout keys and their coarse ordering.
//! - **[`restrictions`]:** per-entry applicability checks.
//! - **[`capabilities`]:** the capability vocabulary restriction tags refer to.
//! - **[`entry`]:** a strategy plus its driver metadata and cost model.
//! - **[`source`]:** the textual table format catalogs are loaded from.

pub mod capabilities;
pub mod entry;
pub mod restrictions;
pub mod selector;
pub mod source;

use std::ops::Range;

pub use capabilities::{Capability, CapabilitySet};
pub use entry::{DriverInfo, Entry, LoopDim};
pub use restrictions::{MatchContext, RejectReason, Requirement, Restrictions, SizeRange, Verdict};
pub use selector::{HwTag, Layout, Precision, Selector, SelectorKey};
pub use source::CatalogSource;

use crate::error::CatalogError;

/// Entries sorted by [`SelectorKey`]. Entries with equal keys keep the order
/// they were supplied in.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<Entry>,
}

impl Catalog {
    pub fn new(mut entries: Vec<Entry>) -> Result<Self, CatalogError> {
        for (index, entry) in entries.iter().enumerate() {
            validate_entry(entry).map_err(|reason| CatalogError::InvalidEntry {
                index,
                strategy: entry.strategy.clone(),
                reason,
            })?;
        }
        // Stable: equal keys keep insertion order.
        entries.sort_by_key(|e| e.selector.key());
        tracing::debug!(entries = entries.len(), "catalog built");
        Ok(Self { entries })
    }

    pub fn from_source(source: CatalogSource) -> Result<Self, CatalogError> {
        Self::new(source.into_entries()?)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Self::from_source(CatalogSource::from_json(json)?)
    }

    pub fn to_source(&self) -> CatalogSource {
        CatalogSource {
            entries: self.entries.iter().map(Into::into).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        Ok(serde_json::to_string_pretty(&self.to_source())?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    /// Index range of entries whose key agrees with `query` on every key field
    /// before the query's first wildcard.
    pub fn range_indices(&self, query: &Selector) -> Range<usize> {
        let (key, known) = query.key_prefix();
        let prefix = &key[..known];
        let head = |e: &Entry| e.selector.key().0;
        let lo = self.entries.partition_point(|e| &head(e)[..known] < prefix);
        let hi = self.entries.partition_point(|e| &head(e)[..known] <= prefix);
        lo..hi
    }

    /// Contiguous slice for [`Catalog::range_indices`]. May include other
    /// kernel types and third-slot variants; filter with [`Selector::admits`].
    pub fn range(&self, query: &Selector) -> &[Entry] {
        &self.entries[self.range_indices(query)]
    }

    /// First entry whose selector equals `selector` on every field.
    pub fn lookup(&self, selector: &Selector) -> Option<&Entry> {
        self.range(selector).iter().find(|e| e.selector == *selector)
    }

    pub fn entries_for<'a>(&'a self, kernel_type: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |e| e.selector.kernel_type == kernel_type)
    }
}

fn validate_entry(entry: &Entry) -> Result<(), String> {
    let sel = &entry.selector;
    if sel.kernel_type.is_empty() {
        return Err("kernel type is empty".to_string());
    }
    if sel.precisions[..2].iter().any(Option::is_none) || sel.layouts[..2].iter().any(Option::is_none) {
        return Err(format!("selector {} leaves a keyed precision/layout slot empty", sel));
    }
    let r = &entry.restrictions;
    if r.alignment.contains(&0) {
        return Err("alignment requirement of 0".to_string());
    }
    if let (Some(lo), Some(hi)) = (r.stepping_min, r.stepping_max) {
        if lo >= hi {
            return Err(format!("empty stepping range [{}, {})", lo, hi));
        }
    }
    let d = &entry.driver_info;
    if d.unroll.contains(&0) || d.wg.contains(&0) {
        return Err(format!("unroll {:?} / workgroup {:?} has a zero factor", d.unroll, d.wg));
    }
    entry.model.validate().map_err(|e| e.to_string())
}
