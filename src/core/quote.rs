//! Market quote abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Point-in-time view of a single symbol. Fetched fresh per evaluation,
/// never mutated afterwards. A missing `current_price` means the valuation
/// verdict cannot be produced for this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub currency: Option<String>,
    pub next_earnings_date: Option<NaiveDate>,
}

impl QuoteSnapshot {
    /// Snapshot with no market data, used when the quote provider is down.
    pub fn empty(symbol: &str) -> Self {
        QuoteSnapshot {
            symbol: symbol.to_string(),
            current_price: None,
            previous_close: None,
            currency: None,
            next_earnings_date: None,
        }
    }

    pub fn day_change(&self) -> Option<f64> {
        match (self.current_price, self.previous_close) {
            (Some(price), Some(prev)) => Some(price - prev),
            _ => None,
        }
    }

    pub fn day_change_percent(&self) -> Option<f64> {
        match (self.current_price, self.previous_close) {
            (Some(price), Some(prev)) if prev != 0.0 => Some(((price - prev) / prev) * 100.0),
            _ => None,
        }
    }
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_change() {
        let mut quote = QuoteSnapshot::empty("AAPL");
        quote.current_price = Some(101.0);
        quote.previous_close = Some(100.0);

        assert_eq!(quote.day_change(), Some(1.0));
        assert!((quote.day_change_percent().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_day_change_missing_data() {
        let mut quote = QuoteSnapshot::empty("AAPL");
        assert!(quote.day_change().is_none());
        assert!(quote.day_change_percent().is_none());

        // Zero previous close must not divide
        quote.current_price = Some(10.0);
        quote.previous_close = Some(0.0);
        assert_eq!(quote.day_change(), Some(10.0));
        assert!(quote.day_change_percent().is_none());
    }
}
