//! Intrinsic value models. Pure computation, no I/O.
//!
//! Both models take rates as raw annualized percentages; the discounted
//! earnings model converts them to fractions internally. Keeping a single
//! convention at this boundary is deliberate: mixing fractions and
//! percentages between the two formulas is a classic silent-result bug.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_HORIZON_YEARS: u32 = 5;

/// No-growth P/E baseline of the multiplier formula.
const NO_GROWTH_PE: f64 = 8.5;
/// Reference AAA corporate bond yield the multiplier formula normalizes to.
const REFERENCE_YIELD_PCT: f64 = 4.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValuationMode {
    DiscountedEarnings,
    GrahamMultiplier,
}

impl Display for ValuationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValuationMode::DiscountedEarnings => "discounted-earnings",
                ValuationMode::GrahamMultiplier => "graham-multiplier",
            }
        )
    }
}

impl FromStr for ValuationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discounted" | "discounted-earnings" | "dcf" => Ok(ValuationMode::DiscountedEarnings),
            "graham" | "graham-multiplier" => Ok(ValuationMode::GrahamMultiplier),
            _ => Err(anyhow::anyhow!("Invalid valuation mode: {}", s)),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValuationError {
    #[error("discount rate must be greater than zero")]
    NonPositiveDiscountRate,
    #[error("the multiplier model requires positive earnings per share")]
    NonPositiveEps,
    #[error("growth estimate drives the earnings multiplier negative")]
    NegativeMultiplier,
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Finite-horizon discounted earnings: each projected year's EPS is grown
/// at `growth_pct` and discounted back at `discount_pct`.
///
/// Negative EPS or growth are mathematically valid here; they simply lower
/// the result.
pub fn discounted_earnings(
    eps: f64,
    growth_pct: f64,
    discount_pct: f64,
    years: u32,
) -> Result<f64, ValuationError> {
    if discount_pct <= 0.0 {
        return Err(ValuationError::NonPositiveDiscountRate);
    }

    let g = growth_pct / 100.0;
    let r = discount_pct / 100.0;

    let mut total = 0.0;
    for t in 1..=years as i32 {
        total += eps * (1.0 + g).powi(t) / (1.0 + r).powi(t);
    }
    Ok(round_cents(total))
}

/// Graham-style closed-form multiplier: `eps * (8.5 + 2g) * (4.4 / r)`,
/// with `g` and `r` as raw percentages.
pub fn graham_multiplier(
    eps: f64,
    growth_pct: f64,
    discount_pct: f64,
) -> Result<f64, ValuationError> {
    if discount_pct <= 0.0 {
        return Err(ValuationError::NonPositiveDiscountRate);
    }
    if eps <= 0.0 {
        return Err(ValuationError::NonPositiveEps);
    }

    let multiplier = NO_GROWTH_PE + 2.0 * growth_pct;
    if multiplier < 0.0 {
        // Below roughly -4.25% growth the formula stops making sense.
        return Err(ValuationError::NegativeMultiplier);
    }

    Ok(round_cents(eps * multiplier * (REFERENCE_YIELD_PCT / discount_pct)))
}

/// Dispatch over the two interchangeable models.
pub fn intrinsic_value(
    mode: ValuationMode,
    eps: f64,
    growth_pct: f64,
    discount_pct: f64,
    years: u32,
) -> Result<f64, ValuationError> {
    match mode {
        ValuationMode::DiscountedEarnings => discounted_earnings(eps, growth_pct, discount_pct, years),
        ValuationMode::GrahamMultiplier => graham_multiplier(eps, growth_pct, discount_pct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graham_reference_case() {
        // 5 * (8.5 + 2*10) * (4.4 / 4.4) = 142.5
        assert_eq!(graham_multiplier(5.0, 10.0, 4.4).unwrap(), 142.5);
    }

    #[test]
    fn test_discounted_earnings_single_year() {
        // 2.0 * 1.10 / 1.05 = 2.0952... -> 2.10
        assert_eq!(discounted_earnings(2.0, 10.0, 5.0, 1).unwrap(), 2.10);
    }

    #[test]
    fn test_discounted_earnings_zero_growth_equals_discounted_annuity() {
        // g = r means every term is exactly eps
        assert_eq!(discounted_earnings(3.0, 5.0, 5.0, 5).unwrap(), 15.0);
    }

    #[test]
    fn test_monotonic_in_eps_and_growth() {
        let base = discounted_earnings(5.0, 10.0, 8.0, 10).unwrap();
        assert!(discounted_earnings(6.0, 10.0, 8.0, 10).unwrap() > base);
        assert!(discounted_earnings(5.0, 12.0, 8.0, 10).unwrap() > base);
    }

    #[test]
    fn test_monotonic_decreasing_in_discount_rate() {
        let mut previous = f64::MAX;
        for discount_pct in [2.0, 4.0, 6.0, 8.0, 10.0] {
            let value = discounted_earnings(5.0, 10.0, discount_pct, 10).unwrap();
            assert!(value < previous, "value must shrink as the rate rises");
            previous = value;
        }
    }

    #[test]
    fn test_zero_discount_rate_is_an_error_not_infinity() {
        assert_eq!(
            discounted_earnings(5.0, 10.0, 0.0, 5),
            Err(ValuationError::NonPositiveDiscountRate)
        );
        assert_eq!(
            graham_multiplier(5.0, 10.0, 0.0),
            Err(ValuationError::NonPositiveDiscountRate)
        );
    }

    #[test]
    fn test_negative_inputs_accepted_by_discounted_model() {
        // Negative EPS is mathematically valid in the discounted model
        let value = discounted_earnings(-2.0, 5.0, 8.0, 5).unwrap();
        assert!(value < 0.0);

        // Negative growth just shrinks the projection
        let shrinking = discounted_earnings(5.0, -10.0, 8.0, 5).unwrap();
        assert!(shrinking < discounted_earnings(5.0, 0.0, 8.0, 5).unwrap());
    }

    #[test]
    fn test_negative_inputs_rejected_by_multiplier_model() {
        assert_eq!(
            graham_multiplier(-2.0, 10.0, 4.4),
            Err(ValuationError::NonPositiveEps)
        );
        assert_eq!(
            graham_multiplier(5.0, -10.0, 4.4),
            Err(ValuationError::NegativeMultiplier)
        );
    }

    #[test]
    fn test_both_horizons_supported() {
        let five = discounted_earnings(5.0, 10.0, 8.0, 5).unwrap();
        let ten = discounted_earnings(5.0, 10.0, 8.0, 10).unwrap();
        assert!(ten > five);
    }

    #[test]
    fn test_results_rounded_to_cents() {
        let value = discounted_earnings(1.234, 7.3, 6.1, 7).unwrap();
        assert_eq!(value, round_cents(value));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "discounted".parse::<ValuationMode>().unwrap(),
            ValuationMode::DiscountedEarnings
        );
        assert_eq!(
            "graham".parse::<ValuationMode>().unwrap(),
            ValuationMode::GrahamMultiplier
        );
        assert!("cigar-butt".parse::<ValuationMode>().is_err());
    }
}
