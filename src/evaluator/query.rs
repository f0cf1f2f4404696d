use serde::{Deserialize, Serialize};

use crate::catalog::{Capability, CapabilitySet, MatchContext, Selector};
use crate::error::QueryError;
use crate::model::ModelInput;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProblemShape {
    pub m: u64,
    pub n: u64,
    pub k: u64,
    /// Batch dimensions, outermost first. Empty for an unbatched GEMM.
    #[serde(default)]
    pub batch: Vec<u64>,
}

impl ProblemShape {
    pub fn new(m: u64, n: u64, k: u64) -> Self {
        Self {
            m,
            n,
            k,
            batch: Vec::new(),
        }
    }

    pub fn batched(m: u64, n: u64, k: u64, batch: Vec<u64>) -> Self {
        Self { m, n, k, batch }
    }

    pub fn sizes(&self) -> [u64; 3] {
        [self.m, self.n, self.k]
    }

    /// Product of the batch dimensions, saturating at `u64::MAX`.
    pub fn batch_count(&self) -> u64 {
        self.batch.iter().fold(1u64, |acc, &b| acc.saturating_mul(b))
    }

    pub fn checked_batch_count(&self) -> Option<u64> {
        self.batch.iter().try_fold(1u64, |acc, &b| acc.checked_mul(b))
    }
}

/// What the caller knows about the target device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub stepping: u32,
    /// Defaults per hardware tag when absent.
    pub eu_count: Option<u32>,
    pub threads_per_eu: Option<u32>,
    pub capabilities: CapabilitySet,
}

/// One selection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelQuery {
    pub selector: Selector,
    pub shape: ProblemShape,
    /// Alignment of A, B, C in elements.
    pub alignment: [u32; 3],
    /// C is accumulated into rather than overwritten.
    pub beta: bool,
    pub post_ops: bool,
    pub device: DeviceInfo,
}

impl KernelQuery {
    pub fn new(selector: Selector, shape: ProblemShape) -> Self {
        Self {
            selector,
            shape,
            alignment: [1, 1, 1],
            beta: false,
            post_ops: false,
            device: DeviceInfo::default(),
        }
    }

    /// Builds a query from the textual tag vocabulary.
    pub fn parse(
        hw: char,
        kernel_type: &str,
        precisions: [&str; 3],
        layouts: [&str; 3],
        shape: ProblemShape,
    ) -> Result<Self, QueryError> {
        Ok(Self::new(Selector::parse(hw, kernel_type, precisions, layouts)?, shape))
    }

    pub fn with_alignment(mut self, alignment: [u32; 3]) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_stepping(mut self, stepping: u32) -> Self {
        self.device.stepping = stepping;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.device.capabilities = capabilities;
        self
    }

    pub fn with_beta(mut self, beta: bool) -> Self {
        self.beta = beta;
        self
    }

    pub fn with_post_ops(mut self, post_ops: bool) -> Self {
        self.post_ops = post_ops;
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        for (size, dim) in self.shape.sizes().into_iter().zip(["m", "n", "k"]) {
            if size == 0 {
                return Err(QueryError::ZeroDimension { dim });
            }
        }
        if let Some(index) = self.shape.batch.iter().position(|&b| b == 0) {
            return Err(QueryError::ZeroBatchDimension { index });
        }
        if self.shape.checked_batch_count().is_none() {
            return Err(QueryError::BatchOverflow);
        }
        for (align, operand) in self.alignment.into_iter().zip(['A', 'B', 'C']) {
            if align == 0 {
                return Err(QueryError::ZeroAlignment { operand });
            }
        }
        Ok(())
    }

    /// Caller capabilities plus the batching facts implied by the shape.
    pub fn capabilities(&self) -> CapabilitySet {
        let mut caps = self.device.capabilities;
        if !self.shape.batch.is_empty() {
            caps.insert(Capability::Batch);
        }
        if self.shape.batch.len() > 1 {
            caps.insert(Capability::BatchMultiDim);
        }
        caps
    }

    pub fn match_context(&self) -> MatchContext {
        MatchContext {
            sizes: self.shape.sizes(),
            stepping: self.device.stepping,
            capabilities: self.capabilities(),
            alignment: self.alignment,
        }
    }

    pub fn model_input(&self) -> ModelInput {
        let hw = self.selector.hw;
        ModelInput {
            m: self.shape.m,
            n: self.shape.n,
            k: self.shape.k,
            batch: self.shape.batch_count(),
            beta: self.beta,
            post_ops: self.post_ops,
            eu_count: self.device.eu_count.unwrap_or_else(|| hw.default_eu_count()),
            threads_per_eu: self
                .device
                .threads_per_eu
                .unwrap_or_else(|| hw.default_threads_per_eu()),
        }
    }
}
