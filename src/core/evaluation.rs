//! Record of a completed evaluation, as appended to the history log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::classify::Label;
use crate::core::eps::EpsBasis;
use crate::core::resolve::Provenance;
use crate::core::valuation::ValuationMode;

/// Resolved inputs plus the derived result. Appended once per evaluation,
/// never mutated. The intrinsic value is recomputed on every request; this
/// record exists for the `history` view, not as a source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,

    pub eps: f64,
    pub eps_basis: EpsBasis,
    pub eps_source: String,

    pub growth_pct: f64,
    pub growth_provenance: Provenance,

    pub discount_pct: f64,
    pub discount_provenance: Provenance,

    pub mode: ValuationMode,
    pub years: u32,

    pub intrinsic_value: f64,
    pub buy_below: f64,
    pub price: Option<f64>,
    pub label: Option<Label>,
}
