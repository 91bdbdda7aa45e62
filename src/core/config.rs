use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::classify::Thresholds;
use crate::core::valuation::{DEFAULT_HORIZON_YEARS, ValuationMode};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FredProviderConfig {
    pub base_url: String,
    /// Never compiled in: taken from config or the FRED_API_KEY env var.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_fred_series")]
    pub series_id: String,
}

fn default_fred_series() -> String {
    // Moody's Seasoned AAA Corporate Bond Yield
    "AAA".to_string()
}

impl FredProviderConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("FRED_API_KEY").ok())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub fred: Option<FredProviderConfig>,
    /// Index symbol whose quote is itself a yield percentage, used as the
    /// bond-yield fallback source.
    #[serde(default = "default_treasury_symbol")]
    pub treasury_symbol: String,
}

fn default_treasury_symbol() -> String {
    "^TYX".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            fred: Some(FredProviderConfig {
                base_url: "https://api.stlouisfed.org".to_string(),
                api_key: None,
                series_id: default_fred_series(),
            }),
            treasury_symbol: default_treasury_symbol(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValuationConfig {
    #[serde(default = "default_mode")]
    pub mode: ValuationMode,
    #[serde(default = "default_years")]
    pub years: u32,
    #[serde(default = "default_timeout_secs")]
    pub provider_timeout_secs: u64,
}

fn default_mode() -> ValuationMode {
    ValuationMode::DiscountedEarnings
}

fn default_years() -> u32 {
    DEFAULT_HORIZON_YEARS
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            mode: default_mode(),
            years: default_years(),
            provider_timeout_secs: default_timeout_secs(),
        }
    }
}

/// What to do when a provider chain is exhausted, per input kind. The
/// discount rate always has a constant; growth prompts unless a constant
/// is configured; EPS always prompts.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FallbackConfig {
    #[serde(default = "default_discount_fallback")]
    pub discount_rate_pct: f64,
    #[serde(default)]
    pub growth_rate_pct: Option<f64>,
}

fn default_discount_fallback() -> f64 {
    4.4
}

impl Default for FallbackConfig {
    fn default() -> Self {
        FallbackConfig {
            discount_rate_pct: default_discount_fallback(),
            growth_rate_pct: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub fallbacks: FallbackConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "ivx", "ivx")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "ivx", "ivx")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");

        assert_eq!(config.valuation.mode, ValuationMode::DiscountedEarnings);
        assert_eq!(config.valuation.years, 5);
        assert_eq!(config.valuation.provider_timeout_secs, 5);
        assert_eq!(config.thresholds.margin_of_safety, 0.20);
        assert_eq!(config.fallbacks.discount_rate_pct, 4.4);
        assert!(config.fallbacks.growth_rate_pct.is_none());
        assert_eq!(config.providers.treasury_symbol, "^TYX");
        assert_eq!(
            config.providers.yahoo.unwrap().base_url,
            "https://query1.finance.yahoo.com"
        );
        let fred = config.providers.fred.unwrap();
        assert_eq!(fred.series_id, "AAA");
        assert!(fred.api_key.is_none());
    }

    #[test]
    fn test_full_config_deserialization() {
        let yaml_str = r#"
valuation:
  mode: graham-multiplier
  years: 10
  provider_timeout_secs: 3

thresholds:
  margin_of_safety: 0.15
  lower_multiplier: 0.85
  upper_multiplier: 1.15

providers:
  yahoo:
    base_url: "http://example.com/yahoo"
  fred:
    base_url: "http://example.com/fred"
    api_key: "test-key"
    series_id: "DAAA"
  treasury_symbol: "^TNX"

fallbacks:
  discount_rate_pct: 4.5
  growth_rate_pct: 10.0

data_path: "/tmp/ivx-data"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");

        assert_eq!(config.valuation.mode, ValuationMode::GrahamMultiplier);
        assert_eq!(config.valuation.years, 10);
        assert_eq!(config.thresholds.margin_of_safety, 0.15);
        assert_eq!(config.thresholds.lower_multiplier, 0.85);
        assert_eq!(config.thresholds.upper_multiplier, 1.15);
        assert_eq!(config.fallbacks.discount_rate_pct, 4.5);
        assert_eq!(config.fallbacks.growth_rate_pct, Some(10.0));
        assert_eq!(config.providers.treasury_symbol, "^TNX");

        let fred = config.providers.fred.as_ref().unwrap();
        assert_eq!(fred.series_id, "DAAA");
        assert_eq!(fred.resolved_api_key().as_deref(), Some("test-key"));

        assert_eq!(config.data_path().unwrap(), PathBuf::from("/tmp/ivx-data"));
    }

    #[test]
    fn test_partial_sections_fill_in_field_defaults() {
        let yaml_str = r#"
valuation:
  years: 10
thresholds:
  margin_of_safety: 0.10
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");

        assert_eq!(config.valuation.years, 10);
        assert_eq!(config.valuation.mode, ValuationMode::DiscountedEarnings);
        assert_eq!(config.thresholds.margin_of_safety, 0.10);
        assert_eq!(config.thresholds.lower_multiplier, 0.80);
    }
}
