use serde::{Deserialize, Serialize};

use super::{CostModel, Efficiency, FrequencyCurve, WorkEstimate};

/// Model `E`.
///
/// Coefficient order: C0, C1, Ck0, Ck1, Cb0, Cb1, Ma, Mb, Mc, Mcu, Ef, Ep0, Ep1,
/// Em, Fp, Fr0, Fr1. Slot 5 doubles as Cp0, the fused post-op overhead, when
/// post-ops are fused without beta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedModel {
    /// Per-wave overhead, constant and linear coefficient.
    pub c: [f64; 2],
    /// Per-wave overhead per wgK slice.
    pub ck: [f64; 2],
    /// Fused beta overhead per wave; `cb[1]` is also Cp0.
    pub cb: [f64; 2],
    pub ma: f64,
    pub mb: f64,
    /// C per-element update cost, store or atomic add only.
    pub mc: f64,
    /// C per-element update cost, load + store.
    pub mcu: f64,
    pub efficiency: Efficiency,
    pub frequency: FrequencyCurve,
}

impl ExtendedModel {
    pub const PARAM_COUNT: usize = 17;

    pub(crate) fn from_params(p: &[f64]) -> Self {
        Self {
            c: [p[0], p[1]],
            ck: [p[2], p[3]],
            cb: [p[4], p[5]],
            ma: p[6],
            mb: p[7],
            mc: p[8],
            mcu: p[9],
            efficiency: Efficiency {
                ef: p[10],
                ep0: p[11],
                ep1: p[12],
                em: p[13],
            },
            frequency: FrequencyCurve {
                fp: p[14],
                fr0: p[15],
                fr1: p[16],
            },
        }
    }

    pub fn params(&self) -> Vec<f64> {
        vec![
            self.c[0],
            self.c[1],
            self.ck[0],
            self.ck[1],
            self.cb[0],
            self.cb[1],
            self.ma,
            self.mb,
            self.mc,
            self.mcu,
            self.efficiency.ef,
            self.efficiency.ep0,
            self.efficiency.ep1,
            self.efficiency.em,
            self.frequency.fp,
            self.frequency.fr0,
            self.frequency.fr1,
        ]
    }

    pub fn cp0(&self) -> f64 {
        self.cb[1]
    }

    pub fn overhead(&self, work: &WorkEstimate) -> f64 {
        let base = work.per_wave(self.c[0], self.c[1]);
        let wg_k = work.wg_k * work.per_wave(self.ck[0], self.ck[1]);
        let fusion = if work.fused_beta && work.beta {
            work.per_wave(self.cb[0], self.cb[1])
        } else if work.fused_post_ops && work.post_ops {
            work.per_wave(self.cp0(), 0.0)
        } else {
            0.0
        };
        base + wg_k + fusion
    }
}

impl CostModel for ExtendedModel {
    fn estimate(&self, work: &WorkEstimate) -> f64 {
        let update = if work.beta { self.mcu } else { self.mc };
        let load = (self.ma * work.unroll_m + self.mb * work.unroll_n) * work.k_per_thread
            + update * work.unroll_m * work.unroll_n;
        let freq = self.frequency.factor(work.fmas);
        self.overhead(work) + self.efficiency.wave_time(work, load, freq)
    }
}
