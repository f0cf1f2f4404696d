use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::query::KernelQuery;
use crate::catalog::{Catalog, DriverInfo, Entry, MatchContext, RejectReason, Verdict};
use crate::config::EvaluatorConfig;
use crate::error::SelectError;
use crate::model::{CostModel, ModelInput, WorkEstimate};

/// Why one candidate was dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    /// Position in catalog storage order.
    pub index: usize,
    pub strategy: String,
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.strategy, self.reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionPath {
    /// Problem fell inside the entry's accept box.
    AcceptRange,
    /// Lowest model cost among eligible entries.
    Scored,
    /// Chosen from the alignment-fallback entries, either by lowest model cost
    /// or, with `score` left `None`, through one of their accept boxes.
    AlignFallback,
}

/// A chosen catalog entry, borrowed from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'c> {
    pub entry: &'c Entry,
    pub index: usize,
    /// Model cost; `None` when chosen through an accept box, on either pass.
    pub score: Option<f64>,
    pub path: SelectionPath,
    /// Entries that survived the selector match.
    pub candidates: usize,
    pub rejections: Vec<Rejection>,
}

impl<'c> Selection<'c> {
    pub fn strategy(&self) -> &'c str {
        &self.entry.strategy
    }

    pub fn driver_info(&self) -> &'c DriverInfo {
        &self.entry.driver_info
    }
}

struct Pick {
    index: usize,
    score: Option<f64>,
    path: SelectionPath,
}

/// Runs queries against one catalog. Holds no mutable state, so a single
/// evaluator can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Evaluator<'c> {
    catalog: &'c Catalog,
    config: EvaluatorConfig,
}

impl<'c> Evaluator<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self::with_config(catalog, EvaluatorConfig::default())
    }

    pub fn with_config(catalog: &'c Catalog, config: EvaluatorConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Relative cost of `entry` for `query`; lower is better.
    pub fn score(&self, entry: &Entry, query: &KernelQuery) -> f64 {
        score_entry(entry, &query.model_input())
    }

    pub fn select(&self, query: &KernelQuery) -> Result<Selection<'c>, SelectError> {
        query.validate()?;
        if self.catalog.is_empty() {
            return Err(SelectError::EmptyCatalog);
        }

        let entries = self.catalog.entries();
        let candidates: Vec<usize> = self
            .catalog
            .range_indices(&query.selector)
            .filter(|&i| entries[i].selector.admits(&query.selector))
            .collect();
        if candidates.is_empty() {
            debug!(selector = %query.selector, "no selector match");
            return Err(SelectError::NoSelectorMatch {
                selector: query.selector.to_string(),
            });
        }

        let ctx = query.match_context();
        let input = query.model_input();
        let mut rejections = Vec::new();

        let mut pick = self.pass(&candidates, false, &ctx, &input, &mut rejections);
        if pick.is_none() {
            if self.config.align_fallback {
                pick = self
                    .pass(&candidates, true, &ctx, &input, &mut rejections)
                    .map(|p| Pick {
                        path: SelectionPath::AlignFallback,
                        ..p
                    });
            } else if self.config.record_rejections {
                rejections.extend(
                    candidates
                        .iter()
                        .filter(|&&i| entries[i].restrictions.is_align_fallback())
                        .map(|&i| Rejection {
                            index: i,
                            strategy: entries[i].strategy.clone(),
                            reason: RejectReason::FallbackOnly,
                        }),
                );
            }
        }

        match pick {
            Some(Pick { index, score, path }) => {
                let entry = &entries[index];
                info!(
                    selector = %query.selector,
                    strategy = %entry.strategy,
                    ?score,
                    ?path,
                    "selected catalog entry"
                );
                Ok(Selection {
                    entry,
                    index,
                    score,
                    path,
                    candidates: candidates.len(),
                    rejections,
                })
            }
            None => {
                debug!(
                    selector = %query.selector,
                    candidates = candidates.len(),
                    "no eligible entry"
                );
                Err(SelectError::NoEligibleEntry {
                    selector: query.selector.to_string(),
                    rejections,
                })
            }
        }
    }

    /// Evaluates independent queries in parallel over the shared catalog.
    pub fn select_batch(&self, queries: &[KernelQuery]) -> Vec<Result<Selection<'c>, SelectError>> {
        queries.par_iter().map(|q| self.select(q)).collect()
    }

    /// One filtering + scoring sweep over either the regular or the
    /// alignment-fallback entries, in storage order.
    fn pass(
        &self,
        candidates: &[usize],
        fallback: bool,
        ctx: &MatchContext,
        input: &ModelInput,
        rejections: &mut Vec<Rejection>,
    ) -> Option<Pick> {
        let entries = self.catalog.entries();
        let mut best: Option<(usize, f64, f64)> = None;

        for &index in candidates {
            let entry = &entries[index];
            if entry.restrictions.is_align_fallback() != fallback {
                continue;
            }
            match entry.restrictions.check(ctx) {
                Verdict::Reject(reason) => {
                    debug!(strategy = %entry.strategy, %reason, "rejected");
                    if self.config.record_rejections {
                        rejections.push(Rejection {
                            index,
                            strategy: entry.strategy.clone(),
                            reason,
                        });
                    }
                }
                Verdict::Accept if self.config.accept_short_circuit => {
                    return Some(Pick {
                        index,
                        score: None,
                        path: SelectionPath::AcceptRange,
                    });
                }
                Verdict::Accept | Verdict::Eligible => {
                    let score = score_entry(entry, input);
                    debug!(strategy = %entry.strategy, score, "scored");
                    // NaN ranks last.
                    let rank = if score.is_nan() {
                        warn!(strategy = %entry.strategy, model = %entry.model, "model produced NaN");
                        f64::INFINITY
                    } else {
                        score
                    };
                    // Strict comparison: equal costs keep the earlier entry.
                    if best.map_or(true, |(_, _, r)| rank < r) {
                        best = Some((index, score, rank));
                    }
                }
            }
        }

        best.map(|(index, score, _)| Pick {
            index,
            score: Some(score),
            path: SelectionPath::Scored,
        })
    }
}

fn score_entry(entry: &Entry, input: &ModelInput) -> f64 {
    let work = WorkEstimate::new(input, &entry.driver_info);
    entry.model.estimate(&work)
}
