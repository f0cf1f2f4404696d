//! # Performance Models
//!
//! Closed-form cost estimates used to rank catalog entries that all passed
//! restriction filtering. Costs are relative: they compare candidates for the
//! same problem and carry no absolute unit.
//!
//! - **[`priority`]** (`W`): wave-quantized work scaled by a hand-tuned priority.
//! - **[`standard`]** (`S`): overhead, load, efficiency, load-balance and
//!   frequency terms with beta-split overheads.
//! - **[`extended`]** (`E`): [`standard`] plus per-wgK and fusion overheads and
//!   a C update cost.

pub mod extended;
pub mod priority;
pub mod standard;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{DriverInfo, LoopDim};
use crate::error::CatalogError;

pub use extended::ExtendedModel;
pub use priority::PriorityModel;
pub use standard::StandardModel;

/// Largest coefficient vector of any model family.
pub const MAX_PARAM_COUNT: usize = ExtendedModel::PARAM_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "char", into = "char")]
pub enum ModelId {
    Priority,
    Standard,
    Extended,
}

impl ModelId {
    pub fn code(self) -> char {
        match self {
            Self::Priority => 'W',
            Self::Standard => 'S',
            Self::Extended => 'E',
        }
    }

    pub fn param_count(self) -> usize {
        match self {
            Self::Priority => PriorityModel::PARAM_COUNT,
            Self::Standard => StandardModel::PARAM_COUNT,
            Self::Extended => ExtendedModel::PARAM_COUNT,
        }
    }
}

impl TryFrom<char> for ModelId {
    type Error = CatalogError;

    fn try_from(code: char) -> Result<Self, Self::Error> {
        match code {
            'W' => Ok(Self::Priority),
            'S' => Ok(Self::Standard),
            'E' => Ok(Self::Extended),
            _ => Err(CatalogError::InvalidModel {
                id: code,
                reason: "unknown model id".to_string(),
            }),
        }
    }
}

impl From<ModelId> for char {
    fn from(id: ModelId) -> char {
        id.code()
    }
}

/// Shared scoring interface of the model families.
pub trait CostModel {
    /// Relative cost of running `work`; lower is better.
    fn estimate(&self, work: &WorkEstimate) -> f64;
}

/// A catalog entry's cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelSource", into = "ModelSource")]
pub enum PerformanceModel {
    Priority(PriorityModel),
    Standard(StandardModel),
    Extended(ExtendedModel),
}

impl PerformanceModel {
    /// Coefficients beyond the family's count are ignored.
    pub fn from_params(id: ModelId, params: &[f64]) -> Result<Self, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidModel {
            id: id.code(),
            reason,
        };
        if params.len() > MAX_PARAM_COUNT {
            return Err(invalid(format!(
                "{} coefficients exceed the maximum of {}",
                params.len(),
                MAX_PARAM_COUNT
            )));
        }
        if params.len() < id.param_count() {
            return Err(invalid(format!(
                "expected {} coefficients, found {}",
                id.param_count(),
                params.len()
            )));
        }
        let used = &params[..id.param_count()];
        let model = match id {
            ModelId::Priority => Self::Priority(PriorityModel::from_params(used)),
            ModelId::Standard => Self::Standard(StandardModel::from_params(used)),
            ModelId::Extended => Self::Extended(ExtendedModel::from_params(used)),
        };
        model.validate()?;
        Ok(model)
    }

    /// Every coefficient finite; efficiencies positive over the partial-wave range.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidModel {
            id: self.id().code(),
            reason,
        };
        if let Some(i) = self.params().iter().position(|p| !p.is_finite()) {
            return Err(invalid(format!("coefficient {} is not finite", i)));
        }
        self.efficiency().map_or(Ok(()), Efficiency::validate).map_err(invalid)
    }

    pub fn id(&self) -> ModelId {
        match self {
            Self::Priority(_) => ModelId::Priority,
            Self::Standard(_) => ModelId::Standard,
            Self::Extended(_) => ModelId::Extended,
        }
    }

    pub fn params(&self) -> Vec<f64> {
        match self {
            Self::Priority(m) => m.params(),
            Self::Standard(m) => m.params(),
            Self::Extended(m) => m.params(),
        }
    }

    fn efficiency(&self) -> Option<&Efficiency> {
        match self {
            Self::Priority(_) => None,
            Self::Standard(m) => Some(&m.efficiency),
            Self::Extended(m) => Some(&m.efficiency),
        }
    }
}

impl CostModel for PerformanceModel {
    fn estimate(&self, work: &WorkEstimate) -> f64 {
        match self {
            Self::Priority(m) => m.estimate(work),
            Self::Standard(m) => m.estimate(work),
            Self::Extended(m) => m.estimate(work),
        }
    }
}

impl fmt::Display for PerformanceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.id().code(), self.params())
    }
}

/// Serialized form: `{ "id": "S", "params": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSource {
    pub id: ModelId,
    pub params: Vec<f64>,
}

impl TryFrom<ModelSource> for PerformanceModel {
    type Error = CatalogError;

    fn try_from(src: ModelSource) -> Result<Self, Self::Error> {
        Self::from_params(src.id, &src.params)
    }
}

impl From<PerformanceModel> for ModelSource {
    fn from(model: PerformanceModel) -> Self {
        Self {
            id: model.id(),
            params: model.params(),
        }
    }
}

/// Peak efficiency and load-balance coefficients shared by `S` and `E`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Efficiency {
    /// Full waves.
    pub ef: f64,
    /// Partial wave, constant coefficient.
    pub ep0: f64,
    /// Partial wave, linear coefficient.
    pub ep1: f64,
    /// Load-balance weight: 0 ignores idle EUs in the last wave, 1 charges a full wave.
    pub em: f64,
}

impl Efficiency {
    fn validate(&self) -> Result<(), String> {
        if self.ef <= 0.0 {
            return Err(format!("full-wave efficiency {} must be positive", self.ef));
        }
        if self.ep0 <= 0.0 || self.ep0 + self.ep1 <= 0.0 {
            return Err(format!(
                "partial-wave efficiency {} + {}*p must stay positive on [0, 1)",
                self.ep0, self.ep1
            ));
        }
        Ok(())
    }

    /// Compute plus load time of all waves. `load` is the per-thread load cost.
    pub fn wave_time(&self, work: &WorkEstimate, load: f64, freq: f64) -> f64 {
        let compute = work.thread_fmas * freq;
        let mut time = work.full_waves * (compute / self.ef + load);
        if work.partial > 0.0 {
            let ep = self.ep0 + self.ep1 * work.partial;
            let weight = self.em + (1.0 - self.em) * work.partial;
            time += weight * (compute / ep + load);
        }
        time
    }
}

/// Clock derating once the problem grows past `fr0` FMAs, saturating at `fr1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyCurve {
    /// Nominal/actual frequency ratio at full throttle.
    pub fp: f64,
    pub fr0: f64,
    pub fr1: f64,
}

impl FrequencyCurve {
    pub fn factor(&self, fmas: f64) -> f64 {
        if fmas <= self.fr0 {
            1.0
        } else if fmas >= self.fr1 {
            self.fp
        } else {
            1.0 + (self.fp - 1.0) * (fmas - self.fr0) / (self.fr1 - self.fr0)
        }
    }
}

/// Problem facts a model is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInput {
    pub m: u64,
    pub n: u64,
    pub k: u64,
    pub batch: u64,
    pub beta: bool,
    pub post_ops: bool,
    pub eu_count: u32,
    pub threads_per_eu: u32,
}

/// Work decomposition of one problem under one entry's driver metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkEstimate {
    pub unroll_m: f64,
    pub unroll_n: f64,
    pub wg_k: f64,
    pub k_per_thread: f64,
    pub threads: f64,
    pub capacity: f64,
    pub waves: f64,
    pub full_waves: f64,
    /// Occupancy of the trailing partial wave, 0 when the last wave is full.
    pub partial: f64,
    pub wave_count: f64,
    pub fmas: f64,
    pub thread_fmas: f64,
    pub beta: bool,
    pub post_ops: bool,
    pub fused_beta: bool,
    pub fused_post_ops: bool,
}

impl WorkEstimate {
    pub fn new(input: &ModelInput, driver: &DriverInfo) -> Self {
        let unroll_m = driver.unroll(LoopDim::M).max(1) as f64;
        let unroll_n = driver.unroll(LoopDim::N).max(1) as f64;
        let wg_k = if driver.k_parallel {
            driver.wg(LoopDim::K).max(1) as f64
        } else {
            1.0
        };
        let (m, n, k, batch) = (input.m as f64, input.n as f64, input.k as f64, input.batch.max(1) as f64);
        let k_per_thread = (k / wg_k).ceil();

        let threads = (m / unroll_m).ceil() * (n / unroll_n).ceil() * wg_k * batch;
        let capacity = (input.eu_count.max(1) as f64) * (input.threads_per_eu.max(1) as f64);
        let waves = threads / capacity;
        let full_waves = waves.floor();

        Self {
            unroll_m,
            unroll_n,
            wg_k,
            k_per_thread,
            threads,
            capacity,
            waves,
            full_waves,
            partial: waves - full_waves,
            wave_count: waves.ceil(),
            fmas: m * n * k * batch,
            thread_fmas: unroll_m * unroll_n * k_per_thread,
            beta: input.beta,
            post_ops: input.post_ops,
            fused_beta: driver.fused_beta,
            fused_post_ops: driver.fused_post_ops,
        }
    }

    /// Overhead charged once per wave: `c0 + c1` for each full wave, `c0 + c1 * p`
    /// for a trailing partial wave of occupancy `p`.
    pub fn per_wave(&self, c0: f64, c1: f64) -> f64 {
        let mut total = self.full_waves * (c0 + c1);
        if self.partial > 0.0 {
            total += c0 + c1 * self.partial;
        }
        total
    }
}
