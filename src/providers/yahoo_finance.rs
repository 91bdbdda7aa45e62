use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::quote::{QuoteProvider, QuoteSnapshot};
use crate::core::resolve::RateSource;
use crate::providers::{encode_symbol, http_client};

/// Yield quotes move slowly, so memoize them for a bounded window.
const YIELD_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Vec<ChartItem>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    currency: Option<String>,
    #[serde(alias = "chartPreviousClose")]
    previous_close: Option<f64>,
}

async fn fetch_chart_meta(base_url: &str, symbol: &str) -> Result<ChartMeta> {
    let url = format!(
        "{}/v8/finance/chart/{}?interval=1d&range=5d",
        base_url,
        encode_symbol(symbol)
    );
    debug!("Requesting quote data from {}", url);

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

    let data = response.json::<YahooChartResponse>().await?;
    let item = data
        .chart
        .result
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No quote data found for symbol: {}", symbol))?;

    Ok(item.meta)
}

// YahooQuoteProvider implementation for QuoteProvider
pub struct YahooQuoteProvider {
    base_url: String,
    cache: Arc<Cache<String, QuoteSnapshot>>,
}

impl YahooQuoteProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, QuoteSnapshot>>) -> Self {
        YahooQuoteProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteProvider {
    #[instrument(
        name = "YahooQuoteFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteSnapshot> {
        if let Some(cached) = self.cache.get(&symbol.to_string()).await {
            return Ok(cached);
        }

        let meta = fetch_chart_meta(&self.base_url, symbol).await?;

        let snapshot = QuoteSnapshot {
            symbol: symbol.to_string(),
            current_price: meta.regular_market_price,
            previous_close: meta.previous_close,
            currency: meta.currency,
            // Filled in from the summary provider by the caller
            next_earnings_date: None,
        };

        self.cache.put(symbol.to_string(), snapshot.clone()).await;
        Ok(snapshot)
    }
}

/// Bond-yield source backed by an index quote whose price is itself an
/// annualized yield percentage (e.g. `^TYX`, the 30-year treasury).
pub struct YahooYieldSource {
    name: String,
    base_url: String,
    symbol: String,
    cache: Arc<Cache<String, f64>>,
}

impl YahooYieldSource {
    pub fn new(base_url: &str, symbol: &str, cache: Arc<Cache<String, f64>>) -> Self {
        YahooYieldSource {
            name: format!("yahoo:{symbol}"),
            base_url: base_url.to_string(),
            symbol: symbol.to_string(),
            cache,
        }
    }
}

#[async_trait]
impl RateSource for YahooYieldSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "YahooYieldFetch", skip(self), fields(symbol = %self.symbol))]
    async fn fetch_pct(&self) -> Result<f64> {
        if let Some(cached) = self.cache.get(&self.name).await {
            return Ok(cached);
        }

        let meta = fetch_chart_meta(&self.base_url, &self.symbol).await?;
        let rate = meta
            .regular_market_price
            .ok_or_else(|| anyhow!("No yield data found for symbol: {}", self.symbol))?;

        self.cache
            .put_with_ttl(self.name.clone(), rate, Some(YIELD_CACHE_TTL))
            .await;
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 150.65,
                        "chartPreviousClose": 148.2,
                        "currency": "USD"
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("AAPL", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooQuoteProvider::new(&mock_server.uri(), cache);
        let quote = provider.fetch_quote("AAPL").await.unwrap();
        assert_eq!(quote.current_price, Some(150.65));
        assert_eq!(quote.previous_close, Some(148.2));
        assert_eq!(quote.currency.as_deref(), Some("USD"));
        assert!(quote.next_earnings_date.is_none());
    }

    #[tokio::test]
    async fn test_quote_without_price_still_returns_snapshot() {
        // A halted or delisted symbol may come back with meta but no price;
        // the snapshot must carry the absence, not fail.
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD"
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("HALT", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooQuoteProvider::new(&mock_server.uri(), cache);
        let quote = provider.fetch_quote("HALT").await.unwrap();
        assert!(quote.current_price.is_none());
    }

    #[tokio::test]
    async fn test_no_quote_result_data() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_mock_server("INVALID", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooQuoteProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_quote("INVALID").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No quote data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_quote_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let cache = Arc::new(Cache::new());
        let provider = YahooQuoteProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_quote("AAPL").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: AAPL"
        );
    }

    #[tokio::test]
    async fn test_yield_source_reads_price_as_percentage() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 4.62,
                        "currency": "USD"
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("TNX", mock_response).await;
        let cache = Arc::new(Cache::new());

        let source = YahooYieldSource::new(&mock_server.uri(), "TNX", cache);
        assert_eq!(source.name(), "yahoo:TNX");
        let rate = source.fetch_pct().await.unwrap();
        assert_eq!(rate, 4.62);
    }

    #[tokio::test]
    async fn test_yield_source_caches_result() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 4.62
                    }
                }]
            }
        }"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/TNX"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = Arc::new(Cache::new());
        let source = YahooYieldSource::new(&mock_server.uri(), "TNX", cache);

        assert_eq!(source.fetch_pct().await.unwrap(), 4.62);
        // Second call must be served from the cache (mock expects one hit)
        assert_eq!(source.fetch_pct().await.unwrap(), 4.62);
    }

    #[tokio::test]
    async fn test_index_symbol_is_percent_encoded() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 4.41
                    }
                }]
            }
        }"#;

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/%5ETYX"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let cache = Arc::new(Cache::new());
        let source = YahooYieldSource::new(&mock_server.uri(), "^TYX", cache);
        assert_eq!(source.fetch_pct().await.unwrap(), 4.41);
    }
}
