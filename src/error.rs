use thiserror::Error;

use crate::evaluator::Rejection;

/// Outcome of a selection that produced no entry.
///
/// None of these are exceptional: a caller is expected to fall back to a
/// generic strategy when it sees one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectError {
    #[error("catalog is empty")]
    EmptyCatalog,

    #[error("no catalog entry matches selector {selector}")]
    NoSelectorMatch { selector: String },

    #[error("no eligible entry for {selector} ({} candidates rejected)", rejections.len())]
    NoEligibleEntry {
        selector: String,
        rejections: Vec<Rejection>,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
}

/// Malformed query input, detected before the catalog is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown hardware tag '{0}'")]
    UnknownHardware(char),

    #[error("unknown precision tag \"{0}\"")]
    UnknownPrecision(String),

    #[error("unknown layout tag \"{0}\"")]
    UnknownLayout(String),

    #[error("problem dimension {dim} must be positive")]
    ZeroDimension { dim: &'static str },

    #[error("batch dimension {index} must be positive")]
    ZeroBatchDimension { index: usize },

    #[error("product of batch dimensions overflows u64")]
    BatchOverflow,

    #[error("alignment of operand {operand} must be positive")]
    ZeroAlignment { operand: char },
}

/// Corrupt or inconsistent catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("entry {index} ({strategy}): {reason}")]
    InvalidEntry {
        index: usize,
        strategy: String,
        reason: String,
    },

    #[error("unknown restriction tag '{0}'")]
    UnknownTag(char),

    #[error("model '{id}': {reason}")]
    InvalidModel { id: char, reason: String },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("catalog source: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("evaluator config: {0}")]
    Json(#[from] serde_json::Error),
}
