use serde::{Deserialize, Serialize};

use super::{CostModel, WorkEstimate};

/// Model `W`: wave-quantized thread work, halved for every unit of priority.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityModel {
    pub priority: f64,
}

impl PriorityModel {
    pub const PARAM_COUNT: usize = 1;

    pub(crate) fn from_params(p: &[f64]) -> Self {
        Self { priority: p[0] }
    }

    pub fn params(&self) -> Vec<f64> {
        vec![self.priority]
    }
}

impl CostModel for PriorityModel {
    fn estimate(&self, work: &WorkEstimate) -> f64 {
        work.wave_count * work.thread_fmas * (-self.priority).exp2()
    }
}
