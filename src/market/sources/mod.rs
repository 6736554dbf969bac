//! Quote provider implementations (Binance, CoinGecko, Yahoo, metals, forex)

mod alpha_vantage;
mod binance;
mod coingecko;
mod metals;
mod synthetic;
mod yahoo;

pub use alpha_vantage::{AlphaVantageClient, ALPHA_VANTAGE_URL};
pub use binance::{BinanceRest, BinanceStream, BINANCE_REST_URL, BINANCE_WS_URL};
pub use coingecko::{CoinGeckoClient, COINGECKO_URL};
pub use metals::{
    ForexRates, GoldQuotes, MetalsDevClient, EXCHANGERATE_URL, GOLDAPI_URL, METALS_DEV_URL,
};
pub use synthetic::SyntheticQuotes;
pub use yahoo::{YahooChart, YAHOO_CHART_URL};

use crate::types::{Candle, MarketKey, MarketTick};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A source of spot quotes for some subset of the supported markets.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, key: MarketKey) -> bool;

    async fn fetch_quote(&self, key: MarketKey) -> Result<MarketTick>;
}

/// Events from the streaming source
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Live ticker update for a market
    Tick(MarketKey, MarketTick),
    /// Live 1m candle update for a market
    Candle(MarketKey, Candle),
    /// Connection established
    Connected,
    /// Connection lost (a reconnect follows)
    Disconnected,
}

/// Ordered fallback chain ending in the synthetic generator, so a fetch
/// always yields a tick. Failing providers are logged and skipped.
pub struct ProviderChain {
    providers: Vec<Arc<dyn QuoteProvider>>,
    synthetic: Arc<SyntheticQuotes>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, synthetic: Arc<SyntheticQuotes>) -> Self {
        Self {
            providers,
            synthetic,
        }
    }

    /// Try each provider in order; on total failure fall back to a
    /// synthetic tick seeded from the last known price.
    pub async fn fetch(&self, key: MarketKey) -> MarketTick {
        for provider in &self.providers {
            if !provider.supports(key) {
                continue;
            }
            match provider.fetch_quote(key).await {
                Ok(tick) if tick.price > 0.0 => {
                    self.synthetic.observe(key, tick.price);
                    return tick;
                }
                Ok(tick) => {
                    warn!(
                        market = %key,
                        source = provider.name(),
                        price = tick.price,
                        "discarding non-positive quote"
                    );
                }
                Err(e) => {
                    warn!(
                        market = %key,
                        source = provider.name(),
                        error = %e,
                        "quote fetch failed, trying next source"
                    );
                }
            }
        }
        self.synthetic.tick(key)
    }
}
