//! Resolution of numeric inputs from unreliable provider chains.
//!
//! Each input kind walks an ordered list of sources. A source that fails,
//! times out or returns an out-of-range value is skipped, never fatal.
//! Resolution itself cannot fail: it ends in a real value, a configured
//! fallback constant, or a marker that manual entry is required.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::core::eps::{EpsEstimate, EpsSource};

/// A single source of an annualized percentage (bond yield, growth estimate).
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_pct(&self) -> Result<f64>;
}

/// Where a resolved value came from, kept so the output can explain why a
/// number looks the way it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Provenance {
    Provider(String),
    Averaged(Vec<(String, f64)>),
    Fallback,
    Manual,
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Provider(name) => write!(f, "{name}"),
            Provenance::Averaged(sources) => {
                let names: Vec<&str> = sources.iter().map(|(n, _)| n.as_str()).collect();
                write!(f, "mean of {}", names.join(", "))
            }
            Provenance::Fallback => write!(f, "fallback"),
            Provenance::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub value_pct: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedRate),
    /// Every source failed and no fallback constant is configured for this
    /// input kind; the caller must collect a value from the user.
    ManualEntryRequired,
}

pub struct ResolveOptions {
    /// Budget for each individual provider call. One unresponsive provider
    /// must not stall the whole chain.
    pub timeout: Duration,
    /// Kind-specific sanity range, as a raw percentage.
    pub valid_range: RangeInclusive<f64>,
}

impl ResolveOptions {
    pub fn discount(timeout: Duration) -> Self {
        ResolveOptions {
            timeout,
            valid_range: 0.01..=30.0,
        }
    }

    pub fn growth(timeout: Duration) -> Self {
        ResolveOptions {
            timeout,
            valid_range: -100.0..=100.0,
        }
    }
}

async fn try_source(source: &dyn RateSource, opts: &ResolveOptions) -> Option<f64> {
    match timeout(opts.timeout, source.fetch_pct()).await {
        Err(_) => {
            warn!(source = source.name(), "provider call timed out");
            None
        }
        Ok(Err(e)) => {
            warn!(source = source.name(), error = %e, "provider failed");
            None
        }
        Ok(Ok(value)) if !value.is_finite() || !opts.valid_range.contains(&value) => {
            warn!(
                source = source.name(),
                value, "provider returned an out-of-range value"
            );
            None
        }
        Ok(Ok(value)) => Some(value),
    }
}

fn exhausted(fallback: Option<f64>) -> Resolution {
    match fallback {
        Some(value_pct) => {
            debug!(value_pct, "all providers exhausted, using fallback");
            Resolution::Resolved(ResolvedRate {
                value_pct,
                provenance: Provenance::Fallback,
            })
        }
        None => Resolution::ManualEntryRequired,
    }
}

/// First-success resolution: sources are tried strictly in order, each
/// exactly once, and the first valid value wins.
pub async fn resolve_first(
    sources: &[Box<dyn RateSource>],
    opts: &ResolveOptions,
    fallback: Option<f64>,
) -> Resolution {
    for source in sources {
        if let Some(value_pct) = try_source(source.as_ref(), opts).await {
            debug!(source = source.name(), value_pct, "resolved");
            return Resolution::Resolved(ResolvedRate {
                value_pct,
                provenance: Provenance::Provider(source.name().to_string()),
            });
        }
    }
    exhausted(fallback)
}

/// Collect-then-average resolution, used for growth estimates: every source
/// is consulted and the result is the arithmetic mean of all successes.
/// A failed source contributes nothing, not zero.
pub async fn resolve_mean(
    sources: &[Box<dyn RateSource>],
    opts: &ResolveOptions,
    fallback: Option<f64>,
) -> Resolution {
    let mut successes = Vec::new();
    for source in sources {
        if let Some(value_pct) = try_source(source.as_ref(), opts).await {
            successes.push((source.name().to_string(), value_pct));
        }
    }

    match successes.len() {
        0 => exhausted(fallback),
        1 => {
            let (name, value_pct) = successes.into_iter().next().unwrap();
            Resolution::Resolved(ResolvedRate {
                value_pct,
                provenance: Provenance::Provider(name),
            })
        }
        n => {
            let value_pct = successes.iter().map(|(_, v)| v).sum::<f64>() / n as f64;
            Resolution::Resolved(ResolvedRate {
                value_pct,
                provenance: Provenance::Averaged(successes),
            })
        }
    }
}

/// First-success resolution for EPS. Returns the winning estimate and the
/// name of the source that produced it, or `None` once the chain is
/// exhausted (the caller then falls back to manual quarterly entry).
pub async fn resolve_eps(
    sources: &[Box<dyn EpsSource>],
    per_call_timeout: Duration,
) -> Option<(EpsEstimate, String)> {
    for source in sources {
        match timeout(per_call_timeout, source.fetch_eps()).await {
            Err(_) => warn!(source = source.name(), "EPS provider call timed out"),
            Ok(Err(e)) => warn!(source = source.name(), error = %e, "EPS provider failed"),
            Ok(Ok(estimate)) if estimate.is_usable() => {
                debug!(
                    source = source.name(),
                    eps = estimate.value_per_share,
                    "resolved EPS"
                );
                return Some((estimate, source.name().to_string()));
            }
            Ok(Ok(estimate)) => warn!(
                source = source.name(),
                eps = estimate.value_per_share,
                "EPS provider returned an unusable value"
            ),
        }
    }
    None
}
