//! Configuration management for MarketMind
//!
//! Loads from TOML files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::market::sources;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: GeneralConfig,
    pub market: MarketConfig,
    pub api_keys: ApiKeysConfig,
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Version tag for logging
    pub tag: String,
    /// Default theme ("dark" or "light")
    pub theme: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Binance REST base URL
    pub binance_rest_url: String,
    /// Binance combined-stream websocket URL
    pub binance_ws_url: String,
    /// CoinGecko REST base URL
    pub coingecko_url: String,
    /// Yahoo Finance chart base URL
    pub yahoo_chart_url: String,
    /// Alpha Vantage query endpoint
    pub alpha_vantage_url: String,
    /// GoldAPI base URL
    pub goldapi_url: String,
    /// metals.dev base URL
    pub metals_dev_url: String,
    /// exchangerate.host endpoint
    pub exchangerate_url: String,
    /// Enable the live websocket stream
    pub stream_enabled: bool,
    /// Fast poll interval in seconds (crypto refresh, indices)
    pub fast_poll_secs: u64,
    /// Slow poll interval in seconds (gold, forex)
    pub slow_poll_secs: u64,
    /// Quote cache TTL in seconds
    pub cache_ttl_secs: u64,
    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeysConfig {
    /// GoldAPI access token (empty disables the source)
    pub goldapi: String,
    /// metals.dev API key (empty disables the source)
    pub metals_dev: String,
    /// Alpha Vantage API key (empty disables the source)
    pub alpha_vantage: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory for state snapshots and exports
    pub data_dir: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .set_default("app.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("app.theme", "dark")?
            // Market defaults; endpoints come from the provider modules
            .set_default("market.binance_rest_url", sources::BINANCE_REST_URL)?
            .set_default("market.binance_ws_url", sources::BINANCE_WS_URL)?
            .set_default("market.coingecko_url", sources::COINGECKO_URL)?
            .set_default("market.yahoo_chart_url", sources::YAHOO_CHART_URL)?
            .set_default("market.alpha_vantage_url", sources::ALPHA_VANTAGE_URL)?
            .set_default("market.goldapi_url", sources::GOLDAPI_URL)?
            .set_default("market.metals_dev_url", sources::METALS_DEV_URL)?
            .set_default("market.exchangerate_url", sources::EXCHANGERATE_URL)?
            .set_default("market.stream_enabled", true)?
            .set_default("market.fast_poll_secs", 30)?
            .set_default("market.slow_poll_secs", 60)?
            .set_default("market.cache_ttl_secs", 30)?
            .set_default("market.http_timeout_secs", 10)?
            // API key defaults (empty = source disabled)
            .set_default("api_keys.goldapi", "")?
            .set_default("api_keys.metals_dev", "")?
            .set_default("api_keys.alpha_vantage", "")?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (MARKETMIND_*)
            .add_source(Environment::with_prefix("MARKETMIND").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "tag={} stream={} fast={}s slow={}s ttl={}s data_dir={}",
            self.app.tag,
            self.market.stream_enabled,
            self.market.fast_poll_secs,
            self.market.slow_poll_secs,
            self.market.cache_ttl_secs,
            self.persistence.data_dir
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.market.fast_poll_secs, 30);
        assert_eq!(config.market.slow_poll_secs, 60);
        assert_eq!(config.market.cache_ttl_secs, 30);
        assert!(config.market.binance_ws_url.starts_with("wss://"));
        assert!(config.api_keys.goldapi.is_empty());
    }

    #[test]
    fn test_endpoint_defaults_come_from_provider_modules() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.market.binance_rest_url, sources::BINANCE_REST_URL);
        assert_eq!(config.market.binance_ws_url, sources::BINANCE_WS_URL);
        assert_eq!(config.market.metals_dev_url, sources::METALS_DEV_URL);
        assert_eq!(config.market.alpha_vantage_url, sources::ALPHA_VANTAGE_URL);
    }

    #[test]
    fn test_digest_has_no_secrets() {
        let config = AppConfig::load().unwrap();
        let digest = config.digest();
        assert!(!digest.contains("goldapi"));
        assert!(digest.contains("fast=30s"));
    }
}
