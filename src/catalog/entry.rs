use std::fmt;

use serde::{Deserialize, Serialize};

use super::restrictions::Restrictions;
use super::selector::Selector;
use crate::model::PerformanceModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopDim {
    M = 0,
    N = 1,
    K = 2,
}

/// Kernel-shape facts the generator and the cost models need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverInfo {
    /// Per-thread unroll along m, n, k.
    pub unroll: [u32; 3],
    /// Workgroup shape in threads along m, n, k.
    pub wg: [u32; 3],
    /// The workgroup's k dimension splits the reduction.
    #[serde(default)]
    pub k_parallel: bool,
    #[serde(default)]
    pub fused_beta: bool,
    #[serde(default)]
    pub fused_post_ops: bool,
}

impl DriverInfo {
    pub fn new(unroll: [u32; 3], wg: [u32; 3]) -> Self {
        Self {
            unroll,
            wg,
            k_parallel: false,
            fused_beta: false,
            fused_post_ops: false,
        }
    }

    pub fn unroll(&self, dim: LoopDim) -> u32 {
        self.unroll[dim as usize]
    }

    pub fn wg(&self, dim: LoopDim) -> u32 {
        self.wg[dim as usize]
    }

    /// Problem extent one workgroup covers along `dim`.
    pub fn wg_tile(&self, dim: LoopDim) -> u32 {
        self.unroll(dim) * self.wg(dim)
    }
}

/// One strategy in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub selector: Selector,
    pub restrictions: Restrictions,
    /// Opaque to this crate; interpreted by the code generator.
    pub strategy: String,
    pub driver_info: DriverInfo,
    pub model: PerformanceModel,
}

impl Entry {
    pub fn new(
        selector: Selector,
        restrictions: Restrictions,
        strategy: impl Into<String>,
        driver_info: DriverInfo,
        model: PerformanceModel,
    ) -> Self {
        Self {
            selector,
            restrictions,
            strategy: strategy.into(),
            driver_info,
            model,
        }
    }

    /// `<selector> <unroll m> <unroll n> <strategy>`
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} {}",
            self.selector.describe(&self.restrictions.alignment),
            self.driver_info.unroll(LoopDim::M),
            self.driver_info.unroll(LoopDim::N),
            self.strategy
        )
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
