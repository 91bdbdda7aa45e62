//! Yahoo quoteSummary scrape: trailing EPS, earnings calendar, reported
//! quarterly actuals and analyst growth trends, all from one endpoint.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::eps::{EpsEstimate, EpsSource, MAX_QUARTERS};
use crate::core::resolve::RateSource;
use crate::providers::{encode_symbol, http_client};

const MODULES: &str = "defaultKeyStatistics,calendarEvents,earningsTrend,earningsHistory";

/// One reported quarter from the earnings history scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsObservation {
    pub quarter: Option<NaiveDate>,
    pub eps_actual: Option<f64>,
    pub eps_estimate: Option<f64>,
    pub surprise_pct: Option<f64>,
}

/// Everything the valuation pipeline reads from the quoteSummary endpoint.
/// Earnings history is ordered most-recent-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySnapshot {
    pub trailing_eps: Option<f64>,
    pub next_earnings_date: Option<NaiveDate>,
    pub earnings_history: Vec<EarningsObservation>,
    pub growth_next_year_pct: Option<f64>,
    pub growth_next_five_years_pct: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(alias = "quoteSummary")]
    quote_summary: QuoteSummaryResult,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResult {
    result: Vec<SummaryItem>,
}

#[derive(Deserialize, Debug, Default)]
struct SummaryItem {
    #[serde(alias = "defaultKeyStatistics")]
    default_key_statistics: Option<KeyStatistics>,
    #[serde(alias = "calendarEvents")]
    calendar_events: Option<CalendarEvents>,
    #[serde(alias = "earningsTrend")]
    earnings_trend: Option<EarningsTrend>,
    #[serde(alias = "earningsHistory")]
    earnings_history: Option<EarningsHistory>,
}

#[derive(Deserialize, Debug)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct KeyStatistics {
    #[serde(alias = "trailingEps")]
    trailing_eps: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
struct CalendarEvents {
    earnings: Option<CalendarEarnings>,
}

#[derive(Deserialize, Debug)]
struct CalendarEarnings {
    #[serde(alias = "earningsDate", default)]
    earnings_date: Vec<RawValue>,
}

#[derive(Deserialize, Debug)]
struct EarningsTrend {
    #[serde(default)]
    trend: Vec<TrendItem>,
}

#[derive(Deserialize, Debug)]
struct TrendItem {
    period: Option<String>,
    growth: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
struct EarningsHistory {
    #[serde(default)]
    history: Vec<HistoryItem>,
}

#[derive(Deserialize, Debug)]
struct HistoryItem {
    quarter: Option<RawValue>,
    #[serde(alias = "epsActual")]
    eps_actual: Option<RawValue>,
    #[serde(alias = "epsEstimate")]
    eps_estimate: Option<RawValue>,
    #[serde(alias = "surprisePercent")]
    surprise_pct: Option<RawValue>,
}

fn epoch_to_date(seconds: f64) -> Option<NaiveDate> {
    Utc.timestamp_opt(seconds as i64, 0)
        .single()
        .map(|dt| dt.date_naive())
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

fn growth_for_period(trend: &Option<EarningsTrend>, period: &str) -> Option<f64> {
    trend.as_ref().and_then(|t| {
        t.trend
            .iter()
            .find(|item| item.period.as_deref() == Some(period))
            .and_then(|item| raw(&item.growth))
            // Yahoo reports trend growth as a fraction
            .map(|g| g * 100.0)
    })
}

impl SummaryItem {
    fn into_snapshot(self) -> SummarySnapshot {
        let trailing_eps = self
            .default_key_statistics
            .as_ref()
            .and_then(|ks| raw(&ks.trailing_eps));

        let next_earnings_date = self
            .calendar_events
            .as_ref()
            .and_then(|ce| ce.earnings.as_ref())
            .and_then(|e| e.earnings_date.first())
            .and_then(|d| d.raw)
            .and_then(epoch_to_date);

        let mut earnings_history: Vec<EarningsObservation> = self
            .earnings_history
            .as_ref()
            .map(|eh| {
                eh.history
                    .iter()
                    .map(|item| EarningsObservation {
                        quarter: raw(&item.quarter).and_then(epoch_to_date),
                        eps_actual: raw(&item.eps_actual),
                        eps_estimate: raw(&item.eps_estimate),
                        surprise_pct: raw(&item.surprise_pct),
                    })
                    .collect()
            })
            .unwrap_or_default();
        // Yahoo lists quarters oldest-first; the pipeline wants them newest-first
        earnings_history.sort_by(|a, b| b.quarter.cmp(&a.quarter));

        let growth_next_year_pct = growth_for_period(&self.earnings_trend, "+1y");
        let growth_next_five_years_pct = growth_for_period(&self.earnings_trend, "+5y");

        SummarySnapshot {
            trailing_eps,
            next_earnings_date,
            earnings_history,
            growth_next_year_pct,
            growth_next_five_years_pct,
        }
    }
}

pub struct YahooSummaryProvider {
    base_url: String,
    cache: Arc<Cache<String, SummarySnapshot>>,
}

impl YahooSummaryProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, SummarySnapshot>>) -> Self {
        YahooSummaryProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }

    #[instrument(
        name = "YahooSummaryFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    pub async fn fetch_summary(&self, symbol: &str) -> Result<SummarySnapshot> {
        if let Some(cached) = self.cache.get(&symbol.to_string()).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url,
            encode_symbol(symbol),
            MODULES
        );
        debug!("Requesting summary data from {}", url);

        let client = http_client()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {} URL: {}", e, symbol, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: QuoteSummaryResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse summary response for {}: {}", symbol, e))?;

        let snapshot = data
            .quote_summary
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No summary data found for symbol: {}", symbol))?
            .into_snapshot();

        self.cache.put(symbol.to_string(), snapshot.clone()).await;
        Ok(snapshot)
    }
}

/// Trailing twelve month EPS as reported by the key statistics module.
pub struct TrailingEpsSource {
    provider: Arc<YahooSummaryProvider>,
    symbol: String,
}

impl TrailingEpsSource {
    pub fn new(provider: Arc<YahooSummaryProvider>, symbol: &str) -> Self {
        TrailingEpsSource {
            provider,
            symbol: symbol.to_string(),
        }
    }
}

#[async_trait]
impl EpsSource for TrailingEpsSource {
    fn name(&self) -> &str {
        "yahoo-ttm-eps"
    }

    async fn fetch_eps(&self) -> Result<EpsEstimate> {
        let summary = self.provider.fetch_summary(&self.symbol).await?;
        let eps = summary
            .trailing_eps
            .ok_or_else(|| anyhow!("No trailing EPS reported for {}", self.symbol))?;
        Ok(EpsEstimate::trailing(eps))
    }
}

/// Sum of the most recent reported quarterly actuals, capped at four.
pub struct ActualsEpsSource {
    provider: Arc<YahooSummaryProvider>,
    symbol: String,
}

impl ActualsEpsSource {
    pub fn new(provider: Arc<YahooSummaryProvider>, symbol: &str) -> Self {
        ActualsEpsSource {
            provider,
            symbol: symbol.to_string(),
        }
    }
}

#[async_trait]
impl EpsSource for ActualsEpsSource {
    fn name(&self) -> &str {
        "yahoo-earnings-history"
    }

    async fn fetch_eps(&self) -> Result<EpsEstimate> {
        let summary = self.provider.fetch_summary(&self.symbol).await?;
        let actuals: Vec<f64> = summary
            .earnings_history
            .iter()
            .filter_map(|obs| obs.eps_actual)
            .take(MAX_QUARTERS)
            .collect();

        if actuals.is_empty() {
            return Err(anyhow!("No reported quarterly EPS for {}", self.symbol));
        }
        Ok(EpsEstimate::from_actuals(&actuals))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendHorizon {
    NextYear,
    NextFiveYears,
}

/// Analyst growth consensus for one horizon. Each horizon is an independent
/// estimate, so a chain of these can fail independently and be averaged.
pub struct TrendGrowthSource {
    name: &'static str,
    provider: Arc<YahooSummaryProvider>,
    symbol: String,
    horizon: TrendHorizon,
}

impl TrendGrowthSource {
    pub fn new(provider: Arc<YahooSummaryProvider>, symbol: &str, horizon: TrendHorizon) -> Self {
        let name = match horizon {
            TrendHorizon::NextYear => "yahoo-trend-1y",
            TrendHorizon::NextFiveYears => "yahoo-trend-5y",
        };
        TrendGrowthSource {
            name,
            provider,
            symbol: symbol.to_string(),
            horizon,
        }
    }
}

#[async_trait]
impl RateSource for TrendGrowthSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch_pct(&self) -> Result<f64> {
        let summary = self.provider.fetch_summary(&self.symbol).await?;
        let growth = match self.horizon {
            TrendHorizon::NextYear => summary.growth_next_year_pct,
            TrendHorizon::NextFiveYears => summary.growth_next_five_years_pct,
        };
        growth.ok_or_else(|| {
            anyhow!(
                "No {} growth trend reported for {}",
                self.name,
                self.symbol
            )
        })
    }
}
