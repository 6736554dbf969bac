//! Core types used throughout MarketMind
//!
//! Defines common data structures for markets, ticks, candles, trades and
//! strategy configuration.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported market families (used to pick polling cadence and providers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketFamily {
    Crypto,
    Index,
    Gold,
    Forex,
}

/// Canonical market keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketKey {
    BTC,
    ETH,
    BNB,
    NIFTY,
    BANKNIFTY,
    GOLD,
    USDINR,
}

impl Default for MarketKey {
    fn default() -> Self {
        MarketKey::BTC
    }
}

impl MarketKey {
    pub const ALL: [MarketKey; 7] = [
        MarketKey::BTC,
        MarketKey::ETH,
        MarketKey::BNB,
        MarketKey::NIFTY,
        MarketKey::BANKNIFTY,
        MarketKey::GOLD,
        MarketKey::USDINR,
    ];

    /// Human-readable market name
    pub fn name(&self) -> &'static str {
        match self {
            MarketKey::BTC => "Bitcoin",
            MarketKey::ETH => "Ethereum",
            MarketKey::BNB => "BNB",
            MarketKey::NIFTY => "Nifty 50",
            MarketKey::BANKNIFTY => "Bank Nifty",
            MarketKey::GOLD => "Gold",
            MarketKey::USDINR => "USD/INR",
        }
    }

    /// Display symbol (what the UI shows)
    pub fn display_symbol(&self) -> &'static str {
        match self {
            MarketKey::BTC => "BTC/USD",
            MarketKey::ETH => "ETH/USD",
            MarketKey::BNB => "BNB/USD",
            MarketKey::NIFTY => "NIFTY",
            MarketKey::BANKNIFTY => "BANKNIFTY",
            MarketKey::GOLD => "XAU/USD",
            MarketKey::USDINR => "USDINR",
        }
    }

    /// Exchange trading pair for Binance APIs (e.g. "BTCUSDT")
    pub fn binance_pair(&self) -> Option<&'static str> {
        match self {
            MarketKey::BTC => Some("BTCUSDT"),
            MarketKey::ETH => Some("ETHUSDT"),
            MarketKey::BNB => Some("BNBUSDT"),
            _ => None,
        }
    }

    /// Yahoo Finance chart symbol (URL-encoded)
    pub fn yahoo_symbol(&self) -> Option<&'static str> {
        match self {
            MarketKey::NIFTY => Some("%5ENSEI"),
            MarketKey::BANKNIFTY => Some("%5ENSEBANK"),
            _ => None,
        }
    }

    pub fn family(&self) -> MarketFamily {
        match self {
            MarketKey::BTC | MarketKey::ETH | MarketKey::BNB => MarketFamily::Crypto,
            MarketKey::NIFTY | MarketKey::BANKNIFTY => MarketFamily::Index,
            MarketKey::GOLD => MarketFamily::Gold,
            MarketKey::USDINR => MarketFamily::Forex,
        }
    }

    /// Normalize an exchange-specific ticker into a market key
    /// (e.g. "BTCUSDT" -> BTC, "XAUUSD" -> GOLD)
    pub fn from_ticker(ticker: &str) -> Option<Self> {
        match ticker.to_uppercase().as_str() {
            "BTC" | "BTCUSDT" => Some(MarketKey::BTC),
            "ETH" | "ETHUSDT" => Some(MarketKey::ETH),
            "BNB" | "BNBUSDT" => Some(MarketKey::BNB),
            "NIFTY" | "^NSEI" => Some(MarketKey::NIFTY),
            "BANKNIFTY" | "^NSEBANK" => Some(MarketKey::BANKNIFTY),
            "GOLD" | "XAUUSD" | "XAU/USD" => Some(MarketKey::GOLD),
            "USDINR" => Some(MarketKey::USDINR),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKey::BTC => "BTC",
            MarketKey::ETH => "ETH",
            MarketKey::BNB => "BNB",
            MarketKey::NIFTY => "NIFTY",
            MarketKey::BANKNIFTY => "BANKNIFTY",
            MarketKey::GOLD => "GOLD",
            MarketKey::USDINR => "USDINR",
        }
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One point-in-time quote snapshot for a market
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTick {
    /// Exchange-specific symbol the tick was produced under
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub high24h: f64,
    #[serde(default)]
    pub low24h: f64,
    #[serde(default)]
    pub open: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl MarketTick {
    pub fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// OHLCV bar for a time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in epoch milliseconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Trade side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl Default for TradeSide {
    fn default() -> Self {
        TradeSide::Buy
    }
}

impl TradeSide {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "buy" | "long" => Some(TradeSide::Buy),
            "sell" | "short" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Emotion tagged on a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Fear,
    Greed,
    Anger,
    Confusion,
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

/// Journal trade record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub market: String,
    pub side: TradeSide,
    pub entry: f64,
    /// None while the position is still open
    pub exit: Option<f64>,
    pub stop_loss: f64,
    pub target: f64,
    pub size: f64,
    #[serde(default)]
    pub emotion: Emotion,
    #[serde(default)]
    pub notes: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Percentage P&L, derived at submit time
    pub profit: f64,
}

impl Trade {
    /// Percentage P&L for the given fill. Buy: (exit-entry)/entry*100,
    /// sell is the negation. Open trades carry zero profit.
    pub fn compute_profit(side: TradeSide, entry: f64, exit: Option<f64>) -> f64 {
        match exit {
            Some(exit) => {
                let pct = (exit - entry) / entry * 100.0;
                match side {
                    TradeSide::Buy => pct,
                    TradeSide::Sell => -pct,
                }
            }
            None => 0.0,
        }
    }
}

/// Strategy indicator choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Indicator {
    Rsi,
    Ema,
    Vwap,
    Macd,
    Bollinger,
}

impl Default for Indicator {
    fn default() -> Self {
        Indicator::Rsi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCondition {
    CrossAbove,
    CrossBelow,
    Overbought,
    Oversold,
}

impl Default for EntryCondition {
    fn default() -> Self {
        EntryCondition::CrossAbove
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCondition {
    TrailingStop,
    FixedTarget,
    OppositeSignal,
}

impl Default for ExitCondition {
    fn default() -> Self {
        ExitCondition::TrailingStop
    }
}

/// Strategy builder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    pub indicator: Indicator,
    pub entry_condition: EntryCondition,
    pub exit_condition: ExitCondition,
    /// "R:R" string, e.g. "1:2"
    pub risk_reward: String,
    pub period: usize,
    /// Target win rate in percent
    pub success_target: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            indicator: Indicator::Rsi,
            entry_condition: EntryCondition::CrossAbove,
            exit_condition: ExitCondition::TrailingStop,
            risk_reward: "1:2".to_string(),
            period: 14,
            success_target: 65,
        }
    }
}

/// Backtest summary. `simulated` marks results produced by the stochastic
/// placeholder generator rather than a replay over real trade history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub win_rate: f64,
    pub total_trades: u32,
    pub profitable_trades: u32,
    pub losing_trades: u32,
    #[serde(rename = "netPL")]
    pub net_pl: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub simulated: bool,
}

/// Signal action emitted by the strategy engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
}

/// A signal produced while walking a candle series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Index into the candle series the signal fired at
    pub index: usize,
    pub time: i64,
    pub price: f64,
    pub action: SignalAction,
    pub indicator: Indicator,
    /// Synthetic confidence in [0.5, 1.0]
    pub confidence: f64,
}
