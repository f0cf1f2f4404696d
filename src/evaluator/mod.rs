pub mod engine;
pub mod query;

pub use engine::{Evaluator, Rejection, Selection, SelectionPath};
pub use query::{DeviceInfo, KernelQuery, ProblemShape};

use std::fmt::Write;

use crate::catalog::Catalog;
use crate::error::SelectError;

/// Selects with the default configuration.
pub fn plan_kernel<'c>(catalog: &'c Catalog, query: &KernelQuery) -> Result<Selection<'c>, SelectError> {
    Evaluator::new(catalog).select(query)
}

/// Human-readable account of a selection outcome, one rejection per line.
pub fn explain_decision(outcome: &Result<Selection<'_>, SelectError>) -> String {
    let mut out = String::new();
    let rejections = match outcome {
        Ok(sel) => {
            let _ = write!(out, "selected {} via {:?}", sel.entry.describe(), sel.path);
            if let Some(score) = sel.score {
                let _ = write!(out, " (score {:.6e})", score);
            }
            let _ = write!(out, ", {} candidate(s)", sel.candidates);
            &sel.rejections[..]
        }
        Err(err) => {
            let _ = write!(out, "{}", err);
            match err {
                SelectError::NoEligibleEntry { rejections, .. } => &rejections[..],
                _ => &[],
            }
        }
    };
    for r in rejections {
        let _ = write!(out, "\n  {}", r);
    }
    out
}

/// Strategy names registered for `kernel_type`, in catalog order.
pub fn list_strategies<'c>(catalog: &'c Catalog, kernel_type: &str) -> Vec<&'c str> {
    catalog
        .entries()
        .iter()
        .filter(|e| e.selector.kernel_type == kernel_type)
        .map(|e| e.strategy.as_str())
        .collect()
}
