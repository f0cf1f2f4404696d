use std::fmt;

use serde::{Deserialize, Serialize};

use super::capabilities::{Capability, CapabilitySet};
use crate::error::CatalogError;

const TAG_DISABLED: char = '@';
const TAG_ALIGN_FALLBACK: char = '#';

/// One parsed character of a restriction tag string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requirement {
    Require(Capability),
    Forbid(Capability),
    /// Entry never matches.
    Disabled,
    /// Entry is only considered when nothing else fits the operand alignment.
    AlignFallback,
}

impl Requirement {
    pub fn from_tag(tag: char) -> Result<Self, CatalogError> {
        match tag {
            TAG_DISABLED => Ok(Self::Disabled),
            TAG_ALIGN_FALLBACK => Ok(Self::AlignFallback),
            _ => {
                let cap = Capability::from_tag(tag).ok_or(CatalogError::UnknownTag(tag))?;
                if tag.is_ascii_uppercase() {
                    Ok(Self::Require(cap))
                } else {
                    Ok(Self::Forbid(cap))
                }
            }
        }
    }

    pub fn tag(self) -> char {
        match self {
            Self::Require(cap) => cap.tag(),
            Self::Forbid(cap) => cap.tag().to_ascii_lowercase(),
            Self::Disabled => TAG_DISABLED,
            Self::AlignFallback => TAG_ALIGN_FALLBACK,
        }
    }

    pub fn parse_all(tags: &str) -> Result<Vec<Self>, CatalogError> {
        tags.chars().map(Self::from_tag).collect()
    }
}

/// Inclusive size bounds; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub const UNBOUNDED: SizeRange = SizeRange { min: None, max: None };

    pub fn new(min: u64, max: u64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, size: u64) -> bool {
        self.min.map_or(true, |min| size >= min) && self.max.map_or(true, |max| size <= max)
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (Some(lo), Some(hi)) => write!(f, "[{}, {}]", lo, hi),
            (Some(lo), None) => write!(f, "[{}, inf)", lo),
            (None, Some(hi)) => write!(f, "[0, {}]", hi),
            (None, None) => write!(f, "any"),
        }
    }
}

/// Concrete problem facts a restriction set is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchContext {
    pub sizes: [u64; 3],
    pub stepping: u32,
    pub capabilities: CapabilitySet,
    pub alignment: [u32; 3],
}

/// Result of checking one entry's restrictions.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Inside the accept box: usable without further checks.
    Accept,
    /// Passed every check; goes on to scoring.
    Eligible,
    Reject(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    Stepping { stepping: u32, min: Option<u32>, max: Option<u32> },
    SizeNotAllowed { dim: char, size: u64, range: SizeRange },
    Disabled,
    MissingCapability(Capability),
    ForbiddenCapability(Capability),
    Alignment { operand: char, required: u32, provided: u32 },
    /// Alignment-fallback entry skipped because the fallback pass did not run.
    FallbackOnly,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stepping { stepping, min, max } => write!(
                f,
                "stepping {} outside [{}, {})",
                stepping,
                min.map_or("-".to_string(), |v| v.to_string()),
                max.map_or("-".to_string(), |v| v.to_string())
            ),
            Self::SizeNotAllowed { dim, size, range } => {
                write!(f, "{} = {} outside allowed {}", dim, size, range)
            }
            Self::Disabled => write!(f, "entry disabled"),
            Self::MissingCapability(cap) => write!(f, "requires {}", cap),
            Self::ForbiddenCapability(cap) => write!(f, "incompatible with {}", cap),
            Self::Alignment { operand, required, provided } => write!(
                f,
                "operand {} alignment {} does not satisfy {}",
                operand, provided, required
            ),
            Self::FallbackOnly => write!(f, "alignment-fallback entry"),
        }
    }
}

const DIMS: [char; 3] = ['m', 'n', 'k'];
const OPERANDS: [char; 3] = ['A', 'B', 'C'];

/// Applicability predicate of a catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restrictions {
    pub stepping_min: Option<u32>,
    pub stepping_max: Option<u32>,
    pub accept_sizes: [SizeRange; 3],
    pub allowed_sizes: [SizeRange; 3],
    pub alignment: [u32; 3],
    pub requirements: Vec<Requirement>,
}

impl Default for Restrictions {
    fn default() -> Self {
        Self {
            stepping_min: None,
            stepping_max: None,
            accept_sizes: [SizeRange::UNBOUNDED; 3],
            allowed_sizes: [SizeRange::UNBOUNDED; 3],
            alignment: [1, 1, 1],
            requirements: Vec::new(),
        }
    }
}

impl Restrictions {
    pub fn with_tags(mut self, tags: &str) -> Result<Self, CatalogError> {
        self.requirements = Requirement::parse_all(tags)?;
        Ok(self)
    }

    pub fn tags(&self) -> String {
        self.requirements.iter().map(|r| r.tag()).collect()
    }

    pub fn is_align_fallback(&self) -> bool {
        self.requirements.contains(&Requirement::AlignFallback)
    }

    /// Runs the checks cheapest first: stepping, accept box, allowed box,
    /// requirement tags, alignment.
    pub fn check(&self, ctx: &MatchContext) -> Verdict {
        let below = self.stepping_min.map_or(false, |min| ctx.stepping < min);
        let above = self.stepping_max.map_or(false, |max| ctx.stepping >= max);
        if below || above {
            return Verdict::Reject(RejectReason::Stepping {
                stepping: ctx.stepping,
                min: self.stepping_min,
                max: self.stepping_max,
            });
        }

        if self.accept_sizes.iter().any(SizeRange::is_set)
            && self
                .accept_sizes
                .iter()
                .zip(ctx.sizes)
                .all(|(range, size)| range.contains(size))
        {
            return Verdict::Accept;
        }

        for ((range, size), dim) in self.allowed_sizes.iter().zip(ctx.sizes).zip(DIMS) {
            if !range.contains(size) {
                return Verdict::Reject(RejectReason::SizeNotAllowed {
                    dim,
                    size,
                    range: *range,
                });
            }
        }

        for req in &self.requirements {
            let failed = match *req {
                Requirement::Disabled => Some(RejectReason::Disabled),
                Requirement::Require(cap) if !ctx.capabilities.contains(cap) => {
                    Some(RejectReason::MissingCapability(cap))
                }
                Requirement::Forbid(cap) if ctx.capabilities.contains(cap) => {
                    Some(RejectReason::ForbiddenCapability(cap))
                }
                _ => None,
            };
            if let Some(reason) = failed {
                return Verdict::Reject(reason);
            }
        }

        for ((&required, &provided), operand) in self.alignment.iter().zip(&ctx.alignment).zip(OPERANDS) {
            if required > 1 && provided % required != 0 {
                return Verdict::Reject(RejectReason::Alignment {
                    operand,
                    required,
                    provided,
                });
            }
        }

        Verdict::Eligible
    }
}
