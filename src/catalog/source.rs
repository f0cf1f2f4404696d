//! Textual catalog table format.
//!
//! Mirrors the layout of existing catalog tables: single-character hardware
//! and tag codes, `-1` for unset bounds, and models as an id plus a flat
//! coefficient list.

use serde::{Deserialize, Serialize};

use super::entry::{DriverInfo, Entry};
use super::restrictions::{Requirement, Restrictions, SizeRange};
use super::selector::Selector;
use crate::error::CatalogError;
use crate::model::{ModelSource, PerformanceModel};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSource {
    pub entries: Vec<EntrySource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySource {
    pub selector: SelectorSource,
    #[serde(default)]
    pub restrictions: RestrictionsSource,
    pub strategy: String,
    pub driver_info: DriverInfo,
    pub model: ModelSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSource {
    pub hw: char,
    pub kernel_type: String,
    pub precisions: [String; 3],
    pub layouts: [String; 3],
}

fn unset3() -> [i64; 3] {
    [-1, -1, -1]
}

fn unset() -> i32 {
    -1
}

fn unit_alignment() -> [u32; 3] {
    [1, 1, 1]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionsSource {
    #[serde(default = "unset")]
    pub stepping_min: i32,
    #[serde(default = "unset")]
    pub stepping_max: i32,
    #[serde(default = "unset3")]
    pub accept_sizes_min: [i64; 3],
    #[serde(default = "unset3")]
    pub accept_sizes_max: [i64; 3],
    #[serde(default = "unset3")]
    pub allowed_sizes_min: [i64; 3],
    #[serde(default = "unset3")]
    pub allowed_sizes_max: [i64; 3],
    #[serde(default = "unit_alignment")]
    pub alignment: [u32; 3],
    #[serde(default)]
    pub tags: String,
}

impl Default for RestrictionsSource {
    fn default() -> Self {
        Self {
            stepping_min: unset(),
            stepping_max: unset(),
            accept_sizes_min: unset3(),
            accept_sizes_max: unset3(),
            allowed_sizes_min: unset3(),
            allowed_sizes_max: unset3(),
            alignment: unit_alignment(),
            tags: String::new(),
        }
    }
}

fn bound<T: TryFrom<i64>>(v: i64) -> Option<T> {
    if v < 0 {
        None
    } else {
        T::try_from(v).ok()
    }
}

fn ranges(min: [i64; 3], max: [i64; 3]) -> [SizeRange; 3] {
    let mut out = [SizeRange::UNBOUNDED; 3];
    for (i, r) in out.iter_mut().enumerate() {
        r.min = bound(min[i]);
        r.max = bound(max[i]);
    }
    out
}

fn raw(v: Option<u64>) -> i64 {
    v.map_or(-1, |x| i64::try_from(x).unwrap_or(i64::MAX))
}

impl TryFrom<RestrictionsSource> for Restrictions {
    type Error = CatalogError;

    fn try_from(src: RestrictionsSource) -> Result<Self, Self::Error> {
        Ok(Self {
            stepping_min: bound(i64::from(src.stepping_min)),
            stepping_max: bound(i64::from(src.stepping_max)),
            accept_sizes: ranges(src.accept_sizes_min, src.accept_sizes_max),
            allowed_sizes: ranges(src.allowed_sizes_min, src.allowed_sizes_max),
            alignment: src.alignment,
            requirements: Requirement::parse_all(&src.tags)?,
        })
    }
}

impl From<&Restrictions> for RestrictionsSource {
    fn from(r: &Restrictions) -> Self {
        let step = |v: Option<u32>| v.map_or(-1, |x| i32::try_from(x).unwrap_or(i32::MAX));
        Self {
            stepping_min: step(r.stepping_min),
            stepping_max: step(r.stepping_max),
            accept_sizes_min: r.accept_sizes.map(|s| raw(s.min)),
            accept_sizes_max: r.accept_sizes.map(|s| raw(s.max)),
            allowed_sizes_min: r.allowed_sizes.map(|s| raw(s.min)),
            allowed_sizes_max: r.allowed_sizes.map(|s| raw(s.max)),
            alignment: r.alignment,
            tags: r.tags(),
        }
    }
}

impl TryFrom<SelectorSource> for Selector {
    type Error = CatalogError;

    fn try_from(src: SelectorSource) -> Result<Self, Self::Error> {
        let p = [src.precisions[0].as_str(), src.precisions[1].as_str(), src.precisions[2].as_str()];
        let l = [src.layouts[0].as_str(), src.layouts[1].as_str(), src.layouts[2].as_str()];
        Ok(Selector::parse(src.hw, &src.kernel_type, p, l)?)
    }
}

impl From<&Selector> for SelectorSource {
    fn from(sel: &Selector) -> Self {
        Self {
            hw: sel.hw.code(),
            kernel_type: sel.kernel_type.clone(),
            precisions: sel.precisions.map(|p| p.map(|p| p.code().to_string()).unwrap_or_default()),
            layouts: sel.layouts.map(|l| l.map(|l| l.code().to_string()).unwrap_or_default()),
        }
    }
}

impl TryFrom<EntrySource> for Entry {
    type Error = CatalogError;

    fn try_from(src: EntrySource) -> Result<Self, Self::Error> {
        Ok(Entry::new(
            Selector::try_from(src.selector)?,
            Restrictions::try_from(src.restrictions)?,
            src.strategy,
            src.driver_info,
            PerformanceModel::try_from(src.model)?,
        ))
    }
}

impl From<&Entry> for EntrySource {
    fn from(e: &Entry) -> Self {
        Self {
            selector: SelectorSource::from(&e.selector),
            restrictions: RestrictionsSource::from(&e.restrictions),
            strategy: e.strategy.clone(),
            driver_info: e.driver_info,
            model: ModelSource::from(e.model.clone()),
        }
    }
}

impl CatalogSource {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Converts every entry, reporting the first failure with its position.
    pub fn into_entries(self) -> Result<Vec<Entry>, CatalogError> {
        self.entries
            .into_iter()
            .enumerate()
            .map(|(index, src)| {
                let strategy = src.strategy.clone();
                Entry::try_from(src).map_err(|e| CatalogError::InvalidEntry {
                    index,
                    strategy,
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
