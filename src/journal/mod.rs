//! Trading journal - trade CRUD, filtering, and performance
//!
//! Trades live in the store at `journal.trades`, newest first. Every
//! mutation is validated before the store is touched, and the
//! performance panel recomputes off the `journal.trades` subscription.

use crate::store::Store;
use crate::types::{Emotion, Trade, TradeSide};
use crate::utils::{generate_id, round_to};
use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("invalid trade: {}", .0.join(", "))]
    Invalid(Vec<String>),
    #[error("trade '{0}' not found")]
    NotFound(String),
}

/// User-supplied trade fields; id, timestamp and profit are derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeInput {
    pub market: String,
    pub side: TradeSide,
    pub entry: f64,
    pub exit: Option<f64>,
    pub stop_loss: f64,
    pub target: f64,
    pub size: f64,
    #[serde(default)]
    pub emotion: Emotion,
    #[serde(default)]
    pub notes: String,
}

/// Ordered validation errors; empty means the input is acceptable.
/// Ordering checks treat the trade as long, matching the entry form.
pub fn validate(input: &TradeInput) -> Vec<String> {
    let mut errors = Vec::new();
    if input.market.is_empty() {
        errors.push("Market is required".to_string());
    }
    if input.entry <= 0.0 {
        errors.push("Valid entry price is required".to_string());
    }
    if input.size <= 0.0 {
        errors.push("Valid position size is required".to_string());
    }
    if input.stop_loss > 0.0 && input.stop_loss >= input.entry {
        errors.push("Stop loss must be below entry price for long positions".to_string());
    }
    if input.target > 0.0 && input.target <= input.entry {
        errors.push("Take profit must be above entry price for long positions".to_string());
    }
    errors
}

fn build_trade(id: String, timestamp: i64, input: TradeInput) -> Trade {
    let profit = Trade::compute_profit(input.side, input.entry, input.exit);
    Trade {
        id,
        market: input.market,
        side: input.side,
        entry: input.entry,
        exit: input.exit,
        stop_loss: input.stop_loss,
        target: input.target,
        size: input.size,
        emotion: input.emotion,
        notes: input.notes,
        timestamp,
        profit,
    }
}

/// Current journal contents; unparseable entries are dropped with a
/// warning rather than poisoning the whole list.
pub fn trades(store: &Store) -> Vec<Trade> {
    let Some(Value::Array(raw)) = store.get("journal.trades") else {
        return Vec::new();
    };
    raw.into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(trade) => Some(trade),
            Err(e) => {
                warn!(error = %e, "skipping malformed journal entry");
                None
            }
        })
        .collect()
}

fn write_trades(store: &Store, trades: &[Trade]) -> Result<()> {
    let value = serde_json::to_value(trades)?;
    store
        .update("journal.trades", value)
        .context("journal write failed")?;
    Ok(())
}

/// Validate and append a trade, newest first.
pub fn add_trade(store: &Store, input: TradeInput) -> Result<Trade, JournalError> {
    let errors = validate(&input);
    if !errors.is_empty() {
        return Err(JournalError::Invalid(errors));
    }

    let trade = build_trade(generate_id(), Utc::now().timestamp_millis(), input);
    let mut all = trades(store);
    all.insert(0, trade.clone());
    if let Err(e) = write_trades(store, &all) {
        warn!(error = %e, "failed to persist new trade");
    }
    info!(market = %trade.market, side = %trade.side, "trade added");
    Ok(trade)
}

/// Replace the fields of an existing trade; the original timestamp is
/// kept and profit is recomputed.
pub fn update_trade(store: &Store, id: &str, input: TradeInput) -> Result<Trade, JournalError> {
    let errors = validate(&input);
    if !errors.is_empty() {
        return Err(JournalError::Invalid(errors));
    }

    let mut all = trades(store);
    let existing = all
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| JournalError::NotFound(id.to_string()))?;
    let updated = build_trade(existing.id.clone(), existing.timestamp, input);
    *existing = updated.clone();
    if let Err(e) = write_trades(store, &all) {
        warn!(error = %e, "failed to persist trade update");
    }
    Ok(updated)
}

pub fn delete_trade(store: &Store, id: &str) -> Result<(), JournalError> {
    let mut all = trades(store);
    let before = all.len();
    all.retain(|t| t.id != id);
    if all.len() == before {
        return Err(JournalError::NotFound(id.to_string()));
    }
    if let Err(e) = write_trades(store, &all) {
        warn!(error = %e, "failed to persist trade deletion");
    }
    info!(id, "trade deleted");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    All,
    Today,
    Week,
    Month,
    Year,
}

impl DateRange {
    fn cutoff_ms(&self, now_ms: i64) -> Option<i64> {
        const DAY: i64 = 24 * 60 * 60 * 1000;
        match self {
            DateRange::All => None,
            DateRange::Today => {
                // Start of the current UTC day
                let now = Utc.timestamp_millis_opt(now_ms).single()?;
                let start = now.date_naive().and_hms_opt(0, 0, 0)?;
                Some(start.and_utc().timestamp_millis())
            }
            DateRange::Week => Some(now_ms - 7 * DAY),
            DateRange::Month => Some(now_ms - 30 * DAY),
            DateRange::Year => Some(now_ms - 365 * DAY),
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::All
    }
}

/// `None` means "all" for the respective dimension.
#[derive(Debug, Clone, Default)]
pub struct TradeFilters {
    pub market: Option<String>,
    pub side: Option<TradeSide>,
    pub emotion: Option<Emotion>,
    pub date_range: DateRange,
}

pub fn filter_trades(trades: &[Trade], filters: &TradeFilters, now_ms: i64) -> Vec<Trade> {
    let cutoff = filters.date_range.cutoff_ms(now_ms);
    trades
        .iter()
        .filter(|t| {
            filters
                .market
                .as_ref()
                .map_or(true, |m| t.market.eq_ignore_ascii_case(m))
                && filters.side.map_or(true, |s| t.side == s)
                && filters.emotion.map_or(true, |e| t.emotion == e)
                && cutoff.map_or(true, |c| t.timestamp >= c)
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Date,
    Market,
    Entry,
    Size,
    Profit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

pub fn sort_trades(trades: &mut [Trade], field: SortField, order: SortOrder) {
    trades.sort_by(|a, b| {
        let ord = match field {
            SortField::Date => a.timestamp.cmp(&b.timestamp),
            SortField::Market => a.market.cmp(&b.market),
            SortField::Entry => a.entry.total_cmp(&b.entry),
            SortField::Size => a.size.total_cmp(&b.size),
            SortField::Profit => a.profit.total_cmp(&b.profit),
        };
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

#[derive(Debug, Clone)]
pub struct Page {
    pub trades: Vec<Trade>,
    pub page: usize,
    pub page_size: usize,
    pub total_trades: usize,
    pub total_pages: usize,
}

/// 1-based pagination; out-of-range pages clamp to the last page.
pub fn paginate(trades: &[Trade], page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_trades = trades.len();
    let total_pages = total_trades.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let slice = trades
        .get(start..(start + page_size).min(total_trades))
        .unwrap_or_default();
    Page {
        trades: slice.to_vec(),
        page,
        page_size,
        total_trades,
        total_pages,
    }
}

/// Performance panel figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub win_rate: f64,
    pub total_trades: usize,
    #[serde(rename = "netPL")]
    pub net_pl: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl Performance {
    fn zero() -> Self {
        Self {
            win_rate: 0.0,
            total_trades: 0,
            net_pl: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
        }
    }
}

pub fn compute_performance(trades: &[Trade]) -> Performance {
    if trades.is_empty() {
        return Performance::zero();
    }

    let wins: Vec<f64> = trades
        .iter()
        .filter(|t| t.profit > 0.0)
        .map(|t| t.profit)
        .collect();
    let losses: Vec<f64> = trades
        .iter()
        .filter(|t| t.profit <= 0.0)
        .map(|t| t.profit)
        .collect();

    let win_rate = wins.len() as f64 / trades.len() as f64 * 100.0;
    let net_pl: f64 = trades.iter().map(|t| t.profit).sum();
    let avg_win = if wins.is_empty() {
        0.0
    } else {
        wins.iter().sum::<f64>() / wins.len() as f64
    };
    // Kept negative: the panel renders the sign
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        losses.iter().sum::<f64>() / losses.len() as f64
    };

    // Coarse Sharpe proxy: win rate against average loss magnitude.
    // Below 10 trades the sample is too small to be meaningful.
    let sharpe_ratio = if trades.len() > 10 {
        (win_rate / 100.0) / (avg_loss.abs() / 100.0).max(0.01)
    } else {
        0.0
    };

    // Spread between the best and worst single trade, relative to the
    // best, over the running prefix
    let mut max_drawdown = 0.0f64;
    let mut peak = f64::NEG_INFINITY;
    let mut trough = f64::INFINITY;
    for trade in trades {
        if trade.profit > peak {
            peak = trade.profit;
        }
        if trade.profit < trough {
            trough = trade.profit;
        }
        if peak > 0.0 {
            let drawdown = (peak - trough) / peak * 100.0;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }

    Performance {
        win_rate: round_to(win_rate, 1),
        total_trades: trades.len(),
        net_pl: round_to(net_pl, 2),
        sharpe_ratio: round_to(sharpe_ratio, 2),
        max_drawdown: round_to(max_drawdown, 1),
        avg_win: round_to(avg_win, 2),
        avg_loss: round_to(avg_loss, 2),
    }
}

/// Subscription target: recompute `performance` from the freshly written
/// trade list.
pub fn refresh_performance(store: &Store, new_trades: &Value) {
    let trades: Vec<Trade> = new_trades
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let perf = compute_performance(&trades);
    match serde_json::to_value(&perf) {
        Ok(value) => {
            if let Err(e) = store.update("performance", value) {
                warn!(error = %e, "performance write failed");
            }
        }
        Err(e) => warn!(error = %e, "failed to encode performance"),
    }
}

/// JSON export blob of the full journal.
pub fn export_json(trades: &[Trade]) -> Result<Value> {
    let payload = json!({
        "totalTrades": trades.len(),
        "trades": serde_json::to_value(trades)?,
    });
    Ok(crate::persistence::export_blob("journal", payload))
}

/// Performance panel export blob.
pub fn export_performance(perf: &Performance) -> Result<Value> {
    Ok(crate::persistence::export_blob(
        "performance",
        serde_json::to_value(perf)?,
    ))
}

/// CSV export with one row per trade.
pub fn export_csv(trades: &[Trade]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for trade in trades {
        writer.serialize(trade)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("csv writer flush failed: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}
