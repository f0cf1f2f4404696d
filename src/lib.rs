//! # kcatalog: GEMM Kernel Catalog and Selector
//!
//! kcatalog picks a GEMM strategy for a concrete problem. A catalog holds many
//! pre-tuned strategies keyed by hardware, precision and layout; each one
//! carries applicability restrictions and an analytic performance model. A
//! query is narrowed by key, filtered by restrictions, and the survivors are
//! ranked by modelled cost.
//!
//! ## Core Modules
//!
//! - **[`catalog`]**: Selector keys, restriction sets, entries and the sorted catalog.
//! - **[`model`]**: The W / S / E performance-model families.
//! - **[`evaluator`]**: Query validation and the selection pipeline.
//! - **[`config`]**: Evaluator knobs, loadable from JSON.
//!
//! ```no_run
//! use kcatalog::{Catalog, Evaluator, KernelQuery, ProblemShape};
//!
//! # fn run(json: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::from_json(json)?;
//! let query = KernelQuery::parse('F', "gemm", ["f16", "f16", "f32"], ["N", "T", "N"], ProblemShape::new(1024, 1024, 64))?;
//! let selection = Evaluator::new(&catalog).select(&query)?;
//! println!("{}", selection.strategy());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod model;

pub use crate::catalog::{
    Capability, CapabilitySet, Catalog, CatalogSource, DriverInfo, Entry, HwTag, Layout, Precision,
    RejectReason, Restrictions, Selector, SizeRange,
};
pub use crate::config::EvaluatorConfig;
pub use crate::error::{CatalogError, ConfigError, QueryError, SelectError};
pub use crate::evaluator::{
    explain_decision, list_strategies, plan_kernel, DeviceInfo, Evaluator, KernelQuery, ProblemShape, Rejection,
    Selection, SelectionPath,
};
pub use crate::model::{CostModel, ModelId, PerformanceModel};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
