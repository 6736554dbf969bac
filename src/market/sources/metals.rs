//! Gold and forex quote providers
//!
//! Gold comes from GoldAPI (token required) with metals.dev as fallback;
//! USD/INR comes from exchangerate.host. The fallback endpoints only carry
//! a spot rate, so change is computed against the previous fetch.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Mutex;

use crate::market::sources::QuoteProvider;
use crate::types::{MarketFamily, MarketKey, MarketTick};

pub const GOLDAPI_URL: &str = "https://www.goldapi.io/api";
pub const METALS_DEV_URL: &str = "https://api.metals.dev/v1";
pub const EXCHANGERATE_URL: &str = "https://api.exchangerate.host/latest";

/// GoldAPI spot quote for XAU/USD.
#[derive(Debug)]
pub struct GoldQuotes {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GoldApiQuote {
    price: f64,
    #[serde(default)]
    ch: f64,
    #[serde(default)]
    chp: f64,
    open_price: Option<f64>,
    high_price: Option<f64>,
    low_price: Option<f64>,
    timestamp: Option<i64>,
}

impl GoldQuotes {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl QuoteProvider for GoldQuotes {
    fn name(&self) -> &'static str {
        "GoldAPI"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key == MarketKey::GOLD
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        if key != MarketKey::GOLD {
            bail!("GoldAPI only serves XAU/USD");
        }
        if self.api_key.is_empty() {
            bail!("no GoldAPI token configured");
        }

        let url = format!("{}/XAU/USD", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-access-token", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("GoldAPI returned {}", response.status());
        }
        let quote: GoldApiQuote = response.json().await?;

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price: quote.price,
            change: quote.ch,
            change_percent: quote.chp,
            volume: 0.0,
            high24h: quote.high_price.unwrap_or(quote.price),
            low24h: quote.low_price.unwrap_or(quote.price),
            open: quote.open_price.unwrap_or(quote.price - quote.ch),
            timestamp: quote
                .timestamp
                .map(|t| t * 1000)
                .unwrap_or_else(MarketTick::now_ms),
        })
    }
}

/// metals.dev fallback; spot price only, change derived from the previous
/// fetch within this process.
#[derive(Debug)]
pub struct MetalsDevClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    prev_price: Mutex<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct MetalsDevResponse {
    metals: MetalsDevPrices,
}

#[derive(Debug, Deserialize)]
struct MetalsDevPrices {
    gold: f64,
}

impl MetalsDevClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            prev_price: Mutex::new(None),
        }
    }
}

#[async_trait]
impl QuoteProvider for MetalsDevClient {
    fn name(&self) -> &'static str {
        "metals.dev"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key == MarketKey::GOLD
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        if key != MarketKey::GOLD {
            bail!("metals.dev only serves gold");
        }
        if self.api_key.is_empty() {
            bail!("no metals.dev key configured");
        }

        let url = format!(
            "{}/latest?api_key={}&currency=USD&unit=oz",
            self.base_url, self.api_key
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            bail!("metals.dev returned {}", response.status());
        }
        let body: MetalsDevResponse = response.json().await?;
        let price = body.metals.gold;

        let prev = {
            let mut guard = self.prev_price.lock().expect("gold price lock poisoned");
            let prev = guard.unwrap_or(price);
            *guard = Some(price);
            prev
        };
        let change = price - prev;

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price,
            change,
            change_percent: if prev != 0.0 { change / prev * 100.0 } else { 0.0 },
            volume: 0.0,
            high24h: price.max(prev),
            low24h: price.min(prev),
            open: prev,
            timestamp: MarketTick::now_ms(),
        })
    }
}

/// USD/INR via exchangerate.host.
#[derive(Debug)]
pub struct ForexRates {
    client: reqwest::Client,
    base_url: String,
    prev_rate: Mutex<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: std::collections::HashMap<String, f64>,
}

impl ForexRates {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            prev_rate: Mutex::new(None),
        }
    }
}

#[async_trait]
impl QuoteProvider for ForexRates {
    fn name(&self) -> &'static str {
        "exchangerate.host"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key.family() == MarketFamily::Forex
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        if key != MarketKey::USDINR {
            bail!("only USD/INR is supported");
        }

        let url = format!("{}?base=USD&symbols=INR", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            bail!("exchangerate.host returned {}", response.status());
        }
        let body: RatesResponse = response.json().await?;
        let rate = *body
            .rates
            .get("INR")
            .context("response missing INR rate")?;

        let prev = {
            let mut guard = self.prev_rate.lock().expect("forex rate lock poisoned");
            let prev = guard.unwrap_or(rate);
            *guard = Some(rate);
            prev
        };
        let change = rate - prev;

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price: rate,
            change,
            change_percent: if prev != 0.0 { change / prev * 100.0 } else { 0.0 },
            volume: 0.0,
            high24h: rate.max(prev),
            low24h: rate.min(prev),
            open: prev,
            timestamp: MarketTick::now_ms(),
        })
    }
}
