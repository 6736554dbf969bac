//! CoinGecko fallback for crypto quotes
//!
//! Used when Binance is unreachable. The simple/price endpoint only
//! carries spot price and 24h change, so the remaining tick fields are
//! derived from those.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::market::sources::QuoteProvider;
use crate::types::{MarketFamily, MarketKey, MarketTick};

pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: f64,
    usd_24h_change: Option<f64>,
}

impl CoinGeckoClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn coin_id(key: MarketKey) -> Option<&'static str> {
        match key {
            MarketKey::BTC => Some("bitcoin"),
            MarketKey::ETH => Some("ethereum"),
            MarketKey::BNB => Some("binancecoin"),
            _ => None,
        }
    }
}

#[async_trait]
impl QuoteProvider for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "CoinGecko"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key.family() == MarketFamily::Crypto
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        let id = Self::coin_id(key).with_context(|| format!("{key} has no CoinGecko id"))?;
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            self.base_url, id
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            bail!("CoinGecko returned {}", response.status());
        }
        let body: HashMap<String, SimplePrice> = response.json().await?;
        let quote = body
            .get(id)
            .with_context(|| format!("CoinGecko response missing '{id}'"))?;

        let change_percent = quote.usd_24h_change.unwrap_or(0.0);
        let price = quote.usd;
        // Back out the absolute change and implied open from the percent
        let open = price / (1.0 + change_percent / 100.0);
        let change = price - open;

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price,
            change,
            change_percent,
            volume: 0.0,
            high24h: price.max(open),
            low24h: price.min(open),
            open,
            timestamp: MarketTick::now_ms(),
        })
    }
}
