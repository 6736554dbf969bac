//! Binance REST and WebSocket clients
//!
//! Primary source for crypto markets: the 24hr ticker endpoint for polled
//! quotes, the klines endpoint for history, and the combined
//! `@ticker`/`@kline_1m` stream for live updates.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::market::sources::{QuoteProvider, StreamEvent};
use crate::types::{Candle, MarketFamily, MarketKey, MarketTick};

pub const BINANCE_REST_URL: &str = "https://api.binance.com/api/v3";
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/stream";

/// Delay before re-dialing the stream after it drops.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct BinanceRest {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Ticker24h {
    #[serde(rename = "lastPrice")]
    last_price: String,
    #[serde(rename = "priceChange")]
    price_change: String,
    #[serde(rename = "priceChangePercent")]
    price_change_percent: String,
    volume: String,
    #[serde(rename = "highPrice")]
    high_price: String,
    #[serde(rename = "lowPrice")]
    low_price: String,
    #[serde(rename = "openPrice")]
    open_price: String,
    #[serde(rename = "closeTime")]
    close_time: i64,
}

impl BinanceRest {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch historical klines. Response rows are arrays:
    /// `[open_time, open, high, low, close, volume, close_time, ...]`.
    pub async fn fetch_klines(
        &self,
        key: MarketKey,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let pair = key
            .binance_pair()
            .with_context(|| format!("{key} has no Binance pair"))?;
        let url = format!(
            "{}/klines?symbol={}&interval={}&limit={}",
            self.base_url, pair, interval, limit
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to fetch klines from Binance")?;
        if !response.status().is_success() {
            bail!("Binance klines returned {}", response.status());
        }

        let rows: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .context("failed to parse Binance klines response")?;

        let candles = rows
            .into_iter()
            .filter_map(|row| {
                if row.len() < 6 {
                    return None;
                }
                Some(Candle {
                    time: row[0].as_i64()?,
                    open: row[1].as_str()?.parse().ok()?,
                    high: row[2].as_str()?.parse().ok()?,
                    low: row[3].as_str()?.parse().ok()?,
                    close: row[4].as_str()?.parse().ok()?,
                    volume: row[5].as_str()?.parse().ok()?,
                })
            })
            .collect();
        Ok(candles)
    }
}

#[async_trait]
impl QuoteProvider for BinanceRest {
    fn name(&self) -> &'static str {
        "Binance"
    }

    fn supports(&self, key: MarketKey) -> bool {
        key.family() == MarketFamily::Crypto
    }

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick> {
        let pair = key
            .binance_pair()
            .with_context(|| format!("{key} has no Binance pair"))?;
        let url = format!("{}/ticker/24hr?symbol={}", self.base_url, pair);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            bail!("Binance ticker returned {}", response.status());
        }
        let ticker: Ticker24h = response.json().await?;

        Ok(MarketTick {
            symbol: key.as_str().to_string(),
            price: ticker.last_price.parse()?,
            change: ticker.price_change.parse()?,
            change_percent: ticker.price_change_percent.parse()?,
            volume: ticker.volume.parse()?,
            high24h: ticker.high_price.parse()?,
            low24h: ticker.low_price.parse()?,
            open: ticker.open_price.parse()?,
            timestamp: ticker.close_time,
        })
    }
}

/// Combined stream payload: `{"stream": "btcusdt@ticker", "data": {...}}`
#[derive(Debug, Deserialize)]
struct CombinedFrame {
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WsTicker {
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "p")]
    price_change: String,
    #[serde(rename = "P")]
    price_change_percent: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "E")]
    event_time: i64,
}

#[derive(Debug, Deserialize)]
struct WsKlineWrapper {
    #[serde(rename = "k")]
    kline: WsKline,
}

#[derive(Debug, Deserialize)]
struct WsKline {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
}

pub struct BinanceStream {
    url: String,
}

impl BinanceStream {
    pub fn new(ws_url: impl Into<String>, keys: &[MarketKey]) -> Self {
        let streams: Vec<String> = keys
            .iter()
            .filter_map(|k| k.binance_pair())
            .map(|pair| {
                let pair = pair.to_lowercase();
                format!("{pair}@ticker/{pair}@kline_1m")
            })
            .collect();
        Self {
            url: format!("{}?streams={}", ws_url.into(), streams.join("/")),
        }
    }

    /// Run the stream until the channel closes, reconnecting after a fixed
    /// delay whenever the connection drops.
    pub async fn run(self, tx: Sender<StreamEvent>) {
        loop {
            info!(source = "Binance", "connecting to websocket stream");
            match connect_async(&self.url).await {
                Ok((ws_stream, _)) => {
                    if tx.send(StreamEvent::Connected).await.is_err() {
                        return;
                    }
                    info!(source = "Binance", "✅ websocket connected");

                    let (mut write, mut read) = ws_stream.split();
                    loop {
                        match read.next().await {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(event) = Self::decode_frame(&text) {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) => {
                                warn!(source = "Binance", "connection closed by server");
                                break;
                            }
                            Some(Err(e)) => {
                                warn!(source = "Binance", error = %e, "websocket error");
                                break;
                            }
                            None => {
                                warn!(source = "Binance", "stream ended");
                                break;
                            }
                            _ => {}
                        }
                    }
                    if tx.send(StreamEvent::Disconnected).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(source = "Binance", error = %e, "websocket connect failed");
                }
            }

            if tx.is_closed() {
                return;
            }
            info!(
                source = "Binance",
                delay_secs = RECONNECT_DELAY.as_secs(),
                "reconnecting after delay"
            );
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// Route a combined-stream frame by `(symbol, stream_type)`.
    fn decode_frame(text: &str) -> Option<StreamEvent> {
        let frame: CombinedFrame = serde_json::from_str(text).ok()?;
        let (symbol, stream_type) = frame.stream.split_once('@')?;
        let key = MarketKey::from_ticker(symbol)?;

        match stream_type {
            "ticker" => {
                let t: WsTicker = serde_json::from_value(frame.data).ok()?;
                let tick = MarketTick {
                    symbol: key.as_str().to_string(),
                    price: t.close.parse().ok()?,
                    change: t.price_change.parse().ok()?,
                    change_percent: t.price_change_percent.parse().ok()?,
                    volume: t.volume.parse().ok()?,
                    high24h: t.high.parse().ok()?,
                    low24h: t.low.parse().ok()?,
                    open: t.open.parse().ok()?,
                    timestamp: t.event_time,
                };
                Some(StreamEvent::Tick(key, tick))
            }
            "kline_1m" => {
                let w: WsKlineWrapper = serde_json::from_value(frame.data).ok()?;
                let candle = Candle {
                    time: w.kline.open_time,
                    open: w.kline.open.parse().ok()?,
                    high: w.kline.high.parse().ok()?,
                    low: w.kline.low.parse().ok()?,
                    close: w.kline.close.parse().ok()?,
                    volume: w.kline.volume.parse().ok()?,
                };
                Some(StreamEvent::Candle(key, candle))
            }
            _ => None,
        }
    }
}
