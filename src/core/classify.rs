//! Price classification against a computed intrinsic value

use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::core::valuation::round_cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Undervalued,
    FairlyValued,
    Overvalued,
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Label::Undervalued => "Undervalued",
                Label::FairlyValued => "Fairly valued",
                Label::Overvalued => "Overvalued",
            }
        )
    }
}

/// Classification band. The multipliers are configuration, not constants:
/// the conventional band is ±20% but ±15% and ±10% are in active use too.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_margin_of_safety")]
    pub margin_of_safety: f64,
    #[serde(default = "default_lower_multiplier")]
    pub lower_multiplier: f64,
    #[serde(default = "default_upper_multiplier")]
    pub upper_multiplier: f64,
}

fn default_margin_of_safety() -> f64 {
    0.20
}

fn default_lower_multiplier() -> f64 {
    0.80
}

fn default_upper_multiplier() -> f64 {
    1.20
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            margin_of_safety: default_margin_of_safety(),
            lower_multiplier: default_lower_multiplier(),
            upper_multiplier: default_upper_multiplier(),
        }
    }
}

/// Highest price that still leaves the configured margin of safety.
pub fn buy_below(intrinsic_value: f64, margin_of_safety: f64) -> f64 {
    round_cents(intrinsic_value * (1.0 - margin_of_safety))
}

/// Strict inequalities on both sides; a price exactly on a boundary is
/// FairlyValued.
pub fn classify(intrinsic_value: f64, price: f64, thresholds: &Thresholds) -> Label {
    if price < intrinsic_value * thresholds.lower_multiplier {
        Label::Undervalued
    } else if price > intrinsic_value * thresholds.upper_multiplier {
        Label::Overvalued
    } else {
        Label::FairlyValued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_below() {
        assert_eq!(buy_below(142.5, 0.20), 114.0);
        assert_eq!(buy_below(100.0, 0.15), 85.0);
    }

    #[test]
    fn test_classification_band() {
        let thresholds = Thresholds::default();

        assert_eq!(classify(100.0, 75.0, &thresholds), Label::Undervalued);
        assert_eq!(classify(100.0, 100.0, &thresholds), Label::FairlyValued);
        assert_eq!(classify(100.0, 125.0, &thresholds), Label::Overvalued);
    }

    #[test]
    fn test_boundary_price_is_fairly_valued() {
        let thresholds = Thresholds::default();

        // Exactly on the lower boundary: 100 * 0.8 = 80
        assert_eq!(classify(100.0, 80.0, &thresholds), Label::FairlyValued);
        assert_eq!(classify(100.0, 79.99, &thresholds), Label::Undervalued);

        // Exactly on the upper boundary: 100 * 1.2 = 120
        assert_eq!(classify(100.0, 120.0, &thresholds), Label::FairlyValued);
        assert_eq!(classify(100.0, 120.01, &thresholds), Label::Overvalued);
    }

    #[test]
    fn test_custom_band() {
        let thresholds = Thresholds {
            margin_of_safety: 0.10,
            lower_multiplier: 0.90,
            upper_multiplier: 1.10,
        };

        assert_eq!(classify(100.0, 89.0, &thresholds), Label::Undervalued);
        assert_eq!(classify(100.0, 111.0, &thresholds), Label::Overvalued);
        assert_eq!(classify(100.0, 95.0, &thresholds), Label::FairlyValued);
    }
}
