//! FRED (Federal Reserve Economic Data) bond-yield source.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::resolve::RateSource;
use crate::providers::http_client;

/// Daily series; a fresh lookup every quarter hour is plenty.
const OBSERVATION_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// FRED marks missing observations with a literal dot.
const NO_DATA_SENTINEL: &str = ".";

#[derive(Deserialize, Debug)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Deserialize, Debug)]
struct Observation {
    date: String,
    value: String,
}

/// Latest observation of a FRED yield series (e.g. `AAA`, Moody's seasoned
/// AAA corporate bond yield), already expressed as an annualized percent.
pub struct FredYieldSource {
    name: String,
    base_url: String,
    api_key: String,
    series_id: String,
    cache: Arc<Cache<String, f64>>,
}

impl FredYieldSource {
    pub fn new(base_url: &str, api_key: &str, series_id: &str, cache: Arc<Cache<String, f64>>) -> Self {
        FredYieldSource {
            name: format!("fred:{series_id}"),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            series_id: series_id.to_string(),
            cache,
        }
    }
}

#[async_trait]
impl RateSource for FredYieldSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "FredYieldFetch", skip(self), fields(series = %self.series_id))]
    async fn fetch_pct(&self) -> Result<f64> {
        if let Some(cached) = self.cache.get(&self.name).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/fred/series/observations?series_id={}&api_key={}&file_type=json&sort_order=desc&limit=1",
            self.base_url, self.series_id, self.api_key
        );
        debug!(series = %self.series_id, "Requesting latest FRED observation");

        let client = http_client()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for series: {}", e, self.series_id))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for series: {}",
                response.status(),
                self.series_id
            ));
        }

        let data = response.json::<ObservationsResponse>().await?;
        let observation = data
            .observations
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No observations found for series: {}", self.series_id))?;

        if observation.value == NO_DATA_SENTINEL {
            return Err(anyhow!(
                "No data for series {} on {}",
                self.series_id,
                observation.date
            ));
        }

        let rate: f64 = observation.value.parse().map_err(|_| {
            anyhow!(
                "Unparseable observation value {:?} for series: {}",
                observation.value,
                self.series_id
            )
        })?;

        self.cache
            .put_with_ttl(self.name.clone(), rate, Some(OBSERVATION_CACHE_TTL))
            .await;
        Ok(rate)
    }
}
