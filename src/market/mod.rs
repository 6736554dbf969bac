//! Market data ingestion
//!
//! Owns the provider chains, the quote cache, the Binance live stream and
//! the polling loops, and republishes everything into the store. Crypto
//! rides the websocket with a REST refresh every fast interval; indices
//! poll fast; gold and forex poll slow. Every fetch bottoms out in the
//! synthetic generator, so markets never stop updating.

pub mod cache;
pub mod sources;

use cache::TickCache;
use sources::{
    AlphaVantageClient, BinanceRest, BinanceStream, CoinGeckoClient, ForexRates, GoldQuotes,
    MetalsDevClient, ProviderChain, StreamEvent, SyntheticQuotes, YahooChart,
};

use crate::config::AppConfig;
use crate::store::Store;
use crate::types::{Candle, MarketFamily, MarketKey, MarketTick};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct MarketFeed {
    store: Arc<Store>,
    cache: TickCache,
    chains: HashMap<MarketFamily, ProviderChain>,
    synthetic: Arc<SyntheticQuotes>,
    binance: BinanceRest,
    yahoo: YahooChart,
    stream_enabled: bool,
    ws_url: String,
    fast_poll: Duration,
    slow_poll: Duration,
    /// Bumped on destroy; a stale fetch compares its snapshot against the
    /// current value before writing back.
    generation: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketFeed {
    pub fn new(config: &AppConfig, store: Arc<Store>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.market.http_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let synthetic = Arc::new(SyntheticQuotes::new());
        let binance = BinanceRest::new(client.clone(), &config.market.binance_rest_url);
        let yahoo = YahooChart::new(client.clone(), &config.market.yahoo_chart_url);

        let mut chains = HashMap::new();
        chains.insert(
            MarketFamily::Crypto,
            ProviderChain::new(
                vec![
                    Arc::new(binance.clone()) as Arc<dyn sources::QuoteProvider>,
                    Arc::new(CoinGeckoClient::new(
                        client.clone(),
                        &config.market.coingecko_url,
                    )),
                ],
                Arc::clone(&synthetic),
            ),
        );
        chains.insert(
            MarketFamily::Index,
            ProviderChain::new(
                vec![
                    Arc::new(yahoo.clone()) as Arc<dyn sources::QuoteProvider>,
                    Arc::new(AlphaVantageClient::new(
                        client.clone(),
                        &config.market.alpha_vantage_url,
                        &config.api_keys.alpha_vantage,
                    )),
                ],
                Arc::clone(&synthetic),
            ),
        );
        chains.insert(
            MarketFamily::Gold,
            ProviderChain::new(
                vec![
                    Arc::new(GoldQuotes::new(
                        client.clone(),
                        &config.market.goldapi_url,
                        &config.api_keys.goldapi,
                    )) as Arc<dyn sources::QuoteProvider>,
                    Arc::new(MetalsDevClient::new(
                        client.clone(),
                        &config.market.metals_dev_url,
                        &config.api_keys.metals_dev,
                    )),
                ],
                Arc::clone(&synthetic),
            ),
        );
        chains.insert(
            MarketFamily::Forex,
            ProviderChain::new(
                vec![Arc::new(ForexRates::new(
                    client,
                    &config.market.exchangerate_url,
                )) as Arc<dyn sources::QuoteProvider>],
                Arc::clone(&synthetic),
            ),
        );

        Ok(Self {
            store,
            cache: TickCache::new(Duration::from_secs(config.market.cache_ttl_secs)),
            chains,
            synthetic,
            binance,
            yahoo,
            stream_enabled: config.market.stream_enabled,
            ws_url: config.market.binance_ws_url.clone(),
            fast_poll: Duration::from_secs(config.market.fast_poll_secs),
            slow_poll: Duration::from_secs(config.market.slow_poll_secs),
            generation: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the live stream and polling loops, then load every market
    /// once so the dashboard has data before the first interval fires.
    pub async fn start(self: &Arc<Self>) {
        let generation = self.generation.load(Ordering::SeqCst);

        if self.stream_enabled {
            self.spawn_stream(generation);
        }

        let fast: Vec<MarketKey> = MarketKey::ALL
            .iter()
            .copied()
            .filter(|k| {
                matches!(k.family(), MarketFamily::Crypto | MarketFamily::Index)
            })
            .collect();
        let slow: Vec<MarketKey> = MarketKey::ALL
            .iter()
            .copied()
            .filter(|k| matches!(k.family(), MarketFamily::Gold | MarketFamily::Forex))
            .collect();

        self.spawn_poller(fast, self.fast_poll, generation);
        self.spawn_poller(slow, self.slow_poll, generation);

        for key in MarketKey::ALL {
            self.refresh(key, generation).await;
        }
        info!(generation, "market feed started");
    }

    fn spawn_stream(self: &Arc<Self>, generation: u64) {
        let (tx, mut rx) = mpsc::channel::<StreamEvent>(256);
        let stream = BinanceStream::new(self.ws_url.clone(), &MarketKey::ALL);
        let stream_handle = tokio::spawn(stream.run(tx));

        let feed = Arc::clone(self);
        let consumer_handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::Tick(key, tick) => {
                        feed.cache.put(key, tick.clone());
                        feed.publish(key, &tick, generation);
                    }
                    StreamEvent::Candle(key, candle) => {
                        feed.publish_candle(key, &candle, generation);
                    }
                    StreamEvent::Connected => {
                        let _ = feed.store.update("ui.streamConnected", json!(true));
                    }
                    StreamEvent::Disconnected => {
                        let _ = feed.store.update("ui.streamConnected", json!(false));
                    }
                }
            }
        });

        let mut tasks = self.tasks.lock().expect("task list lock poisoned");
        tasks.push(stream_handle);
        tasks.push(consumer_handle);
    }

    fn spawn_poller(self: &Arc<Self>, keys: Vec<MarketKey>, period: Duration, generation: u64) {
        let feed = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The immediate first tick duplicates the initial load
            interval.tick().await;
            loop {
                interval.tick().await;
                for &key in &keys {
                    feed.refresh(key, generation).await;
                }
            }
        });
        self.tasks
            .lock()
            .expect("task list lock poisoned")
            .push(handle);
    }

    /// Serve from cache when fresh, else walk the family's provider
    /// chain. Always publishes something.
    async fn refresh(&self, key: MarketKey, generation: u64) {
        if let Some(tick) = self.cache.get(key) {
            debug!(market = %key, "serving cached quote");
            self.publish(key, &tick, generation);
            return;
        }

        let chain = &self.chains[&key.family()];
        let tick = chain.fetch(key).await;
        self.cache.put(key, tick.clone());
        self.publish(key, &tick, generation);
    }

    /// Merge a tick into `markets.<KEY>`, preserving the static fields
    /// (name, volatility, sentiment), then re-notify the coarse path.
    fn publish(&self, key: MarketKey, tick: &MarketTick, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(market = %key, "dropping tick from torn-down feed");
            return;
        }

        let path = format!("markets.{key}");
        let mut entry = self
            .store
            .get(&path)
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();

        entry.insert("symbol".into(), json!(key.display_symbol()));
        entry.insert("name".into(), json!(key.name()));
        entry.insert("price".into(), json!(tick.price));
        entry.insert("change".into(), json!(tick.change));
        entry.insert("changePercent".into(), json!(tick.change_percent));
        entry.insert("volume".into(), json!(tick.volume));
        entry.insert("high24h".into(), json!(tick.high24h));
        entry.insert("low24h".into(), json!(tick.low24h));
        entry.insert("open".into(), json!(tick.open));
        entry.insert("lastUpdated".into(), json!(tick.timestamp));

        if let Err(e) = self.store.update(&path, Value::Object(entry)) {
            warn!(market = %key, error = %e, "failed to publish tick");
            return;
        }
        self.store.notify_path("markets");
    }

    /// Live 1m candle for the active market lands at `chart.lastCandle`.
    fn publish_candle(&self, key: MarketKey, candle: &Candle, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let active = self
            .store
            .get("activeMarket")
            .and_then(|v| v.as_str().map(str::to_owned));
        if active.as_deref() != Some(key.as_str()) {
            return;
        }
        match serde_json::to_value(candle) {
            Ok(value) => {
                let _ = self.store.update("chart.lastCandle", value);
            }
            Err(e) => warn!(market = %key, error = %e, "failed to encode candle"),
        }
    }

    /// Historical candles for the chart. Crypto uses Binance klines,
    /// indices use Yahoo daily bars; anything else, or any upstream
    /// failure, yields a synthetic random-walk series of `limit` candles.
    pub async fn fetch_historical(
        &self,
        key: MarketKey,
        interval: &str,
        limit: usize,
    ) -> Vec<Candle> {
        let fetched = match key.family() {
            MarketFamily::Crypto => self.binance.fetch_klines(key, interval, limit).await,
            MarketFamily::Index => self.yahoo.fetch_daily_candles(key).await,
            _ => Err(anyhow::anyhow!("no historical source for {key}")),
        };

        match fetched {
            Ok(candles) if !candles.is_empty() => candles,
            Ok(_) => {
                warn!(market = %key, "historical source returned no candles, using synthetic");
                self.synthetic.candles(key, limit)
            }
            Err(e) => {
                warn!(market = %key, error = %e, "historical fetch failed, using synthetic");
                self.synthetic.candles(key, limit)
            }
        }
    }

    /// Tear down: invalidate in-flight fetches, abort tasks, drop cache.
    pub fn destroy(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut tasks = self.tasks.lock().expect("task list lock poisoned");
        for task in tasks.drain(..) {
            task.abort();
        }
        self.cache.clear();
        info!("market feed stopped");
    }
}

impl Drop for MarketFeed {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_with_store() -> (Arc<MarketFeed>, Arc<Store>) {
        let config = AppConfig::load().unwrap();
        let store = Arc::new(Store::new());
        let feed = Arc::new(MarketFeed::new(&config, Arc::clone(&store)).unwrap());
        (feed, store)
    }

    fn tick(key: MarketKey, price: f64) -> MarketTick {
        MarketTick {
            symbol: key.as_str().to_string(),
            price,
            change: 100.0,
            change_percent: 0.15,
            volume: 1234.0,
            high24h: price + 50.0,
            low24h: price - 50.0,
            open: price - 100.0,
            timestamp: 1717000000000,
        }
    }

    #[tokio::test]
    async fn test_publish_merges_static_fields() {
        let (feed, store) = feed_with_store();
        feed.publish(MarketKey::BTC, &tick(MarketKey::BTC, 70000.0), 0);

        let entry = store.get("markets.BTC").unwrap();
        assert_eq!(entry["price"], 70000.0);
        assert_eq!(entry["changePercent"], 0.15);
        // Static metadata from the default tree survives the merge
        assert_eq!(entry["name"], "Bitcoin");
        assert_eq!(entry["volatility"], "High");
    }

    #[tokio::test]
    async fn test_publish_notifies_coarse_markets_path() {
        use std::sync::atomic::AtomicUsize;
        let (feed, store) = feed_with_store();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store.subscribe("markets", move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        feed.publish(MarketKey::GOLD, &tick(MarketKey::GOLD, 2350.0), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_write_is_dropped() {
        let (feed, store) = feed_with_store();
        feed.destroy();
        // destroy bumped the generation; a fetch started before it must
        // not write back
        feed.publish(MarketKey::BTC, &tick(MarketKey::BTC, 1.0), 0);
        assert_eq!(store.get("markets.BTC.price"), Some(json!(65234.56)));
    }

    #[tokio::test]
    async fn test_candle_ignored_for_inactive_market() {
        let (feed, store) = feed_with_store();
        let candle = Candle {
            time: 1717000000000,
            open: 3500.0,
            high: 3510.0,
            low: 3495.0,
            close: 3505.0,
            volume: 12.0,
        };
        // Default active market is BTC; ETH candles are dropped
        feed.publish_candle(MarketKey::ETH, &candle, 0);
        assert_eq!(store.get("chart.lastCandle"), None);

        feed.publish_candle(MarketKey::BTC, &candle, 0);
        assert_eq!(store.get("chart.lastCandle").unwrap()["close"], 3505.0);
    }

    #[tokio::test]
    async fn test_historical_falls_back_to_synthetic() {
        let (feed, _) = feed_with_store();
        // Forex has no historical source at all
        let candles = feed.fetch_historical(MarketKey::USDINR, "1d", 30).await;
        assert_eq!(candles.len(), 30);
        assert!(candles.iter().all(|c| c.low <= c.high));
    }
}
