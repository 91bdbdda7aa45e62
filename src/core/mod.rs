//! Core business logic abstractions

pub mod cache;
pub mod classify;
pub mod config;
pub mod eps;
pub mod evaluation;
pub mod log;
pub mod quote;
pub mod resolve;
pub mod valuation;

// Re-export main types for cleaner imports
pub use classify::{Label, Thresholds};
pub use eps::{EpsBasis, EpsEstimate, EpsSource};
pub use quote::{QuoteProvider, QuoteSnapshot};
pub use resolve::{Provenance, RateSource, ResolvedRate, Resolution};
pub use valuation::ValuationMode;
