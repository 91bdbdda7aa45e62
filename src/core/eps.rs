//! Earnings-per-share estimation

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// EPS is a trailing twelve month figure, so at most four quarters count.
pub const MAX_QUARTERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EpsBasis {
    ManualSum,
    TrailingTwelveMonths,
    ScrapedActuals,
}

impl Display for EpsBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                EpsBasis::ManualSum => "manual",
                EpsBasis::TrailingTwelveMonths => "TTM",
                EpsBasis::ScrapedActuals => "reported quarters",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpsEstimate {
    pub value_per_share: f64,
    pub basis: EpsBasis,
    pub quarters_used: u32,
}

impl EpsEstimate {
    /// Sums user-supplied quarterly figures, capped at four quarters.
    pub fn from_quarters(quarters: &[f64]) -> Self {
        let used = &quarters[..quarters.len().min(MAX_QUARTERS)];
        EpsEstimate {
            value_per_share: used.iter().sum(),
            basis: EpsBasis::ManualSum,
            quarters_used: used.len() as u32,
        }
    }

    /// Trailing twelve month EPS as reported by a market-data provider.
    pub fn trailing(value_per_share: f64) -> Self {
        EpsEstimate {
            value_per_share,
            basis: EpsBasis::TrailingTwelveMonths,
            quarters_used: MAX_QUARTERS as u32,
        }
    }

    /// Sums reported quarterly actuals, most recent first, capped at four.
    pub fn from_actuals(actuals: &[f64]) -> Self {
        let used = &actuals[..actuals.len().min(MAX_QUARTERS)];
        EpsEstimate {
            value_per_share: used.iter().sum(),
            basis: EpsBasis::ScrapedActuals,
            quarters_used: used.len() as u32,
        }
    }

    /// A full-year figure entered directly, e.g. via a CLI flag.
    pub fn manual_total(value_per_share: f64) -> Self {
        EpsEstimate {
            value_per_share,
            basis: EpsBasis::ManualSum,
            quarters_used: 0,
        }
    }

    /// Zero or negative EPS invalidates the downstream valuation; it must
    /// surface as "insufficient data" rather than a garbage intrinsic value.
    pub fn is_usable(&self) -> bool {
        self.value_per_share.is_finite() && self.value_per_share > 0.0
    }
}

#[async_trait]
pub trait EpsSource: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch_eps(&self) -> Result<EpsEstimate>;
}
