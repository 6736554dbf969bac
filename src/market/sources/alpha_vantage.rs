//! Alpha Vantage GLOBAL_QUOTE fallback for the index markets.
//!
//! Free-tier key required; the provider is disabled when the key is empty.
//! Quote fields arrive as numbered string keys ("05. price" etc.).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::market::sources::QuoteProvider;
use crate::types::{MarketFamily, MarketKey, MarketTick};

pub const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

#[derive(Debug)]
pub struct AlphaVantageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    quote: Option<GlobalQuote>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "02. open")]
    open: String,
    #[serde(rename = "03. high")]
    high: String,
    #[serde(rename = "04. low")]
    low: String,
    #[serde(rename = "05. price")]
    price: String,
    #[serde(rename = "06. volume")]
    volume: String,
    #[serde(rename = "09. change")]
    change: String,
    #[serde(rename = "10. change percent")]
    change_percent: String,
}

impl AlphaVantageClient {
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

    fn symbol(key: MarketKey) -> Option<&'static str> {
        match key {
            MarketKey::NIFTY => Some("^NSEI"),
            MarketKey::BANKNIFTY => Some("^NSEBANK"),
            _ => None,
        }
    }
}

fn parse_field(raw: &str, name: &str) -> Result<f64> {
    raw.trim_end_matches('%')
        .parse()
        .with_context(|| format!("unparseable Alpha Vantage field '{name}': {raw:?}"))
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "AlphaVantage"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key.family() == MarketFamily::Index
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        let symbol = Self::symbol(key)
            .with_context(|| format!("{key} has no Alpha Vantage symbol"))?;
        if self.api_key.is_empty() {
            bail!("no Alpha Vantage key configured");
        }

        let url = format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url, symbol, self.api_key
        );
        let response: GlobalQuoteResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .context("failed to parse Alpha Vantage response")?;

        // Rate-limited responses come back as an empty or missing quote
        let quote = response
            .quote
            .context("Alpha Vantage response carried no quote")?;

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price: parse_field(&quote.price, "price")?,
            change: parse_field(&quote.change, "change")?,
            change_percent: parse_field(&quote.change_percent, "change percent")?,
            volume: parse_field(&quote.volume, "volume")?,
            high24h: parse_field(&quote.high, "high")?,
            low24h: parse_field(&quote.low, "low")?,
            open: parse_field(&quote.open, "open")?,
            timestamp: MarketTick::now_ms(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mapping() {
        assert_eq!(AlphaVantageClient::symbol(MarketKey::NIFTY), Some("^NSEI"));
        assert_eq!(
            AlphaVantageClient::symbol(MarketKey::BANKNIFTY),
            Some("^NSEBANK")
        );
        assert_eq!(AlphaVantageClient::symbol(MarketKey::BTC), None);
    }

    #[test]
    fn test_parse_quote_payload() {
        let raw = r#"{
            "Global Quote": {
                "01. symbol": "^NSEI",
                "02. open": "22252.34",
                "03. high": "22510.23",
                "04. low": "22380.45",
                "05. price": "22450.75",
                "06. volume": "45234567890",
                "07. latest trading day": "2024-06-03",
                "08. previous close": "22252.34",
                "09. change": "198.41",
                "10. change percent": "0.8917%"
            }
        }"#;
        let parsed: GlobalQuoteResponse = serde_json::from_str(raw).unwrap();
        let quote = parsed.quote.unwrap();
        assert_eq!(parse_field(&quote.price, "price").unwrap(), 22450.75);
        assert!((parse_field(&quote.change_percent, "pct").unwrap() - 0.8917).abs() < 1e-9);
    }

    #[test]
    fn test_rate_limited_response_has_no_quote() {
        let raw = r#"{"Note": "API call frequency exceeded"}"#;
        let parsed: GlobalQuoteResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.quote.is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = AlphaVantageClient::new(
            reqwest::Client::new(),
            ALPHA_VANTAGE_URL,
            "",
        );
        assert!(client.fetch_quote(MarketKey::NIFTY).await.is_err());
    }
}
