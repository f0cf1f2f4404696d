use serde::{Deserialize, Serialize};

use super::{CostModel, Efficiency, FrequencyCurve, WorkEstimate};

/// Model `S`.
///
/// Coefficient order: Cm0, Cm1, C00, C01, C10, C11, Ma, Mb, Ef, Ep0, Ep1, Em,
/// Fp, Fr0, Fr1. The second index of the overhead terms selects beta = 0/1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardModel {
    /// Minimum constant overhead, indexed by beta.
    pub cm: [f64; 2],
    /// Per-wave overhead, constant coefficient, indexed by beta.
    pub c0: [f64; 2],
    /// Per-wave overhead, linear coefficient, indexed by beta.
    pub c1: [f64; 2],
    /// A per-element load cost.
    pub ma: f64,
    /// B per-element load cost.
    pub mb: f64,
    pub efficiency: Efficiency,
    pub frequency: FrequencyCurve,
}

impl StandardModel {
    pub const PARAM_COUNT: usize = 15;

    pub(crate) fn from_params(p: &[f64]) -> Self {
        Self {
            cm: [p[0], p[1]],
            c0: [p[2], p[3]],
            c1: [p[4], p[5]],
            ma: p[6],
            mb: p[7],
            efficiency: Efficiency {
                ef: p[8],
                ep0: p[9],
                ep1: p[10],
                em: p[11],
            },
            frequency: FrequencyCurve {
                fp: p[12],
                fr0: p[13],
                fr1: p[14],
            },
        }
    }

    pub fn params(&self) -> Vec<f64> {
        vec![
            self.cm[0],
            self.cm[1],
            self.c0[0],
            self.c0[1],
            self.c1[0],
            self.c1[1],
            self.ma,
            self.mb,
            self.efficiency.ef,
            self.efficiency.ep0,
            self.efficiency.ep1,
            self.efficiency.em,
            self.frequency.fp,
            self.frequency.fr0,
            self.frequency.fr1,
        ]
    }

    pub fn overhead(&self, work: &WorkEstimate) -> f64 {
        let b = usize::from(work.beta || work.fused_beta);
        let per_wave = work.per_wave(self.c0[b], self.c1[b]);
        per_wave.max(self.cm[b])
    }
}

impl CostModel for StandardModel {
    fn estimate(&self, work: &WorkEstimate) -> f64 {
        let load = (self.ma * work.unroll_m + self.mb * work.unroll_n) * work.k_per_thread;
        let freq = self.frequency.factor(work.fmas);
        self.overhead(work) + self.efficiency.wave_time(work, load, freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DriverInfo;
    use crate::model::ModelInput;

    fn model() -> StandardModel {
        StandardModel::from_params(&[
            10.0, 20.0, // Cm
            1.0, 2.0, // C0
            0.5, 1.0, // C1
            0.01, 0.01, // Ma, Mb
            1.0, 0.8, 0.1, 1.0, // Ef, Ep0, Ep1, Em
            1.0, 1e9, 1e10, // Fp, Fr0, Fr1
        ])
    }

    fn work(m: u64, beta: bool) -> WorkEstimate {
        let input = ModelInput {
            m,
            n: 256,
            k: 128,
            batch: 1,
            beta,
            post_ops: false,
            eu_count: 8,
            threads_per_eu: 8,
        };
        WorkEstimate::new(&input, &DriverInfo::new([32, 32, 1], [1, 1, 1]))
    }

    #[test]
    fn test_params_round_trip() {
        let m = model();
        assert_eq!(StandardModel::from_params(&m.params()), m);
    }

    #[test]
    fn test_beta_selects_overhead_set() {
        let m = model();
        assert_eq!(m.overhead(&work(256, false)), 10.0);
        assert_eq!(m.overhead(&work(256, true)), 20.0);
    }

    #[test]
    fn test_cost_grows_with_problem() {
        let m = model();
        let small = m.estimate(&work(256, false));
        let large = m.estimate(&work(4096, false));
        assert!(large > small);
    }
}
