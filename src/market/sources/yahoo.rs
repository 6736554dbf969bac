//! Yahoo Finance chart client for index quotes and history
//!
//! Primary source for NIFTY and BANKNIFTY. One chart request serves both
//! the spot quote (from `meta`) and the candle series (timestamps plus
//! the quote indicator arrays).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::market::sources::QuoteProvider;
use crate::types::{Candle, MarketFamily, MarketKey, MarketTick};

pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Clone)]
pub struct YahooChart {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

impl YahooChart {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch_chart(
        &self,
        key: MarketKey,
        interval: &str,
        range: &str,
    ) -> Result<ChartResult> {
        let symbol = key
            .yahoo_symbol()
            .with_context(|| format!("{key} has no Yahoo symbol"))?;
        let url = format!(
            "{}/{}?interval={}&range={}",
            self.base_url, symbol, interval, range
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            bail!("Yahoo chart returned {}", response.status());
        }
        let body: ChartResponse = response
            .json()
            .await
            .context("failed to parse Yahoo chart response")?;
        body.chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .context("Yahoo chart response carried no result")
    }

    /// Daily candles for the last month.
    pub async fn fetch_daily_candles(&self, key: MarketKey) -> Result<Vec<Candle>> {
        let result = self.fetch_chart(key, "1d", "1mo").await?;
        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .unwrap_or_default();

        let open = quote.open.unwrap_or_default();
        let high = quote.high.unwrap_or_default();
        let low = quote.low.unwrap_or_default();
        let close = quote.close.unwrap_or_default();
        let volume = quote.volume.unwrap_or_default();

        // Rows with any missing OHLC field are skipped (market holidays)
        let candles = timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                Some(Candle {
                    time: ts * 1000,
                    open: (*open.get(i)?)?,
                    high: (*high.get(i)?)?,
                    low: (*low.get(i)?)?,
                    close: (*close.get(i)?)?,
                    volume: volume.get(i).copied().flatten().unwrap_or(0.0),
                })
            })
            .collect();
        Ok(candles)
    }
}

#[async_trait]
impl QuoteProvider for YahooChart {
    fn name(&self) -> &'static str {
        "Yahoo"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key.family() == MarketFamily::Index
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        let result = self.fetch_chart(key, "1m", "1d").await?;
        let meta = result.meta;

        let price = meta
            .regular_market_price
            .context("Yahoo meta missing regularMarketPrice")?;
        let prev_close = meta.chart_previous_close.unwrap_or(price);
        let change = price - prev_close;
        let change_percent = if prev_close != 0.0 {
            change / prev_close * 100.0
        } else {
            0.0
        };

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price,
            change,
            change_percent,
            volume: meta.regular_market_volume.unwrap_or(0.0),
            high24h: meta.regular_market_day_high.unwrap_or(price),
            low24h: meta.regular_market_day_low.unwrap_or(price),
            open: prev_close,
            timestamp: meta
                .regular_market_time
                .map(|t| t * 1000)
                .unwrap_or_else(MarketTick::now_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_response_parses() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 22500.5,
                        "chartPreviousClose": 22400.0,
                        "regularMarketDayHigh": 22600.0,
                        "regularMarketDayLow": 22350.0,
                        "regularMarketVolume": 123456,
                        "regularMarketTime": 1717000000
                    },
                    "timestamp": [1716900000, 1716986400],
                    "indicators": {
                        "quote": [{
                            "open": [22400.0, null],
                            "high": [22450.0, 22500.0],
                            "low": [22380.0, 22390.0],
                            "close": [22420.0, 22480.0],
                            "volume": [1000, 2000]
                        }]
                    }
                }]
            }
        }"#;
        let parsed: ChartResponse = serde_json::from_str(body).unwrap();
        let result = &parsed.chart.result.as_ref().unwrap()[0];
        assert_eq!(result.meta.regular_market_price, Some(22500.5));
        assert_eq!(result.timestamp.as_ref().unwrap().len(), 2);
        // Second row has a null open and would be dropped from candles
        assert!(result.indicators.quote[0].open.as_ref().unwrap()[1].is_none());
    }

    #[tokio::test]
    async fn test_unsupported_market_errors() {
        let client = YahooChart::new(reqwest::Client::new(), YAHOO_CHART_URL);
        assert!(!client.supports(MarketKey::BTC));
        assert!(client.fetch_quote(MarketKey::BTC).await.is_err());
    }
}
