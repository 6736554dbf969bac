//! Strategy engine - signals, metrics, simulated backtest, library
//!
//! The backtest is openly simulated: results are drawn from calibrated
//! ranges rather than replayed against history, and every result carries
//! `simulated: true` so downstream consumers can label it. The RNG is
//! injected so runs are reproducible under test. Signal generation and
//! trade metrics are real computations over candles and journal trades.

use crate::persistence::{KvStore, KEY_STRATEGIES};
use crate::types::{
    BacktestResult, Candle, EntryCondition, Indicator, SignalAction, StrategyConfig, Trade,
    TradeSignal,
};
use crate::utils::{ema, generate_id, round_to, simple_rsi};
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// One point of the simulated equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: i64,
    pub equity: f64,
}

/// Simulated backtest. The config shapes nothing but is recorded with
/// saved strategies; the ranges match what the dashboard panel expects.
pub fn run_backtest<R: Rng>(rng: &mut R, _config: &StrategyConfig) -> BacktestResult {
    let win_rate = rng.gen_range(60..=85) as f64;
    let total_trades = rng.gen_range(50..=200u32);
    let profitable_trades = (total_trades as f64 * (win_rate / 100.0)).round() as u32;

    BacktestResult {
        win_rate,
        total_trades,
        profitable_trades,
        losing_trades: total_trades - profitable_trades,
        net_pl: rng.gen_range(1000.0..5000.0),
        max_drawdown: -rng.gen_range(5.0..15.0),
        sharpe_ratio: rng.gen_range(1.5..3.0),
        avg_win: rng.gen_range(1.5..3.0),
        avg_loss: -rng.gen_range(1.0..2.0),
        profit_factor: rng.gen_range(1.2..2.5),
        simulated: true,
    }
}

/// Random-walk equity curve: 100 steps, each a return in (-0.9%, +1.1%),
/// the slight upward drift matching the simulated results.
pub fn equity_curve<R: Rng>(rng: &mut R, starting_equity: f64, steps: usize) -> Vec<EquityPoint> {
    let mut equity = starting_equity;
    (0..steps)
        .map(|i| {
            let change = (rng.gen::<f64>() - 0.45) * 2.0;
            equity *= 1.0 + change / 100.0;
            EquityPoint {
                time: i as i64,
                equity,
            }
        })
        .collect()
}

/// Run a simulated backtest off the strategy panel's current config and
/// store the results at `strategy.backtestResults`.
pub fn run_backtest_into_store<R: Rng>(
    rng: &mut R,
    store: &crate::store::Store,
) -> Result<BacktestResult> {
    let config: StrategyConfig = store
        .get("strategy")
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    let result = run_backtest(rng, &config);
    store.update("strategy.backtestResults", serde_json::to_value(&result)?)?;
    Ok(result)
}

/// Walk the series with a sliding window of `period` closes and emit
/// indicator-driven signals. Confidence is synthetic, in [0.5, 1.0].
pub fn generate_trade_signals<R: Rng>(
    rng: &mut R,
    candles: &[Candle],
    config: &StrategyConfig,
) -> Vec<TradeSignal> {
    let mut signals = Vec::new();
    if candles.len() <= config.period {
        return signals;
    }

    for i in config.period..candles.len() {
        let closes: Vec<f64> = candles[i - config.period..i].iter().map(|c| c.close).collect();
        let current_price = candles[i].close;

        let action = match config.indicator {
            Indicator::Rsi => {
                let rsi = simple_rsi(&closes, config.period);
                match config.entry_condition {
                    EntryCondition::Oversold if rsi < 30.0 => Some(SignalAction::Buy),
                    EntryCondition::Overbought if rsi > 70.0 => Some(SignalAction::Sell),
                    _ => None,
                }
            }
            Indicator::Ema => {
                let ema_value = ema(&closes, config.period);
                match config.entry_condition {
                    EntryCondition::CrossAbove if current_price > ema_value => {
                        Some(SignalAction::Buy)
                    }
                    EntryCondition::CrossBelow if current_price < ema_value => {
                        Some(SignalAction::Sell)
                    }
                    _ => None,
                }
            }
            // Remaining indicators have no signal logic yet
            _ => None,
        };

        if let Some(action) = action {
            signals.push(TradeSignal {
                index: i,
                time: candles[i].time,
                price: current_price,
                action,
                indicator: config.indicator,
                confidence: rng.gen::<f64>() * 0.5 + 0.5,
            });
        }
    }

    signals
}

/// Metrics over a set of closed trades (profit in percent per trade).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyMetrics {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_trades: usize,
    pub profitable_trades: usize,
    pub losing_trades: usize,
}

impl StrategyMetrics {
    fn zero() -> Self {
        Self {
            win_rate: 0.0,
            profit_factor: 0.0,
            expectancy: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            total_trades: 0,
            profitable_trades: 0,
            losing_trades: 0,
        }
    }
}

pub fn strategy_metrics(trades: &[Trade]) -> StrategyMetrics {
    if trades.is_empty() {
        return StrategyMetrics::zero();
    }

    let (wins, losses): (Vec<&Trade>, Vec<&Trade>) =
        trades.iter().partition(|t| t.profit > 0.0);

    let win_rate = wins.len() as f64 / trades.len() as f64 * 100.0;
    let total_profit: f64 = wins.iter().map(|t| t.profit).sum();
    let total_loss: f64 = losses.iter().map(|t| t.profit).sum::<f64>().abs();
    let profit_factor = if total_loss > 0.0 {
        total_profit / total_loss
    } else {
        f64::INFINITY
    };

    let avg_win = if wins.is_empty() {
        0.0
    } else {
        total_profit / wins.len() as f64
    };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        total_loss / losses.len() as f64
    };
    let expectancy = (win_rate / 100.0 * avg_win) - ((100.0 - win_rate) / 100.0 * avg_loss);

    // Sharpe over per-trade returns, population stddev
    let returns: Vec<f64> = trades.iter().map(|t| t.profit).collect();
    let avg_return = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - avg_return).powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    let std_dev = variance.sqrt();
    let sharpe_ratio = if std_dev > 0.0 {
        avg_return / std_dev
    } else {
        0.0
    };

    // Drawdown on the cumulative-profit path, as percent off the running
    // peak
    let mut max_drawdown = 0.0f64;
    let mut peak = f64::NEG_INFINITY;
    let mut cumulative = 0.0;
    for trade in trades {
        cumulative += trade.profit;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > 0.0 {
            let drawdown = (peak - cumulative) / peak * 100.0;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }
    }

    StrategyMetrics {
        win_rate: round_to(win_rate, 1),
        profit_factor: if profit_factor.is_finite() {
            round_to(profit_factor, 2)
        } else {
            profit_factor
        },
        expectancy: round_to(expectancy, 2),
        sharpe_ratio: round_to(sharpe_ratio, 2),
        max_drawdown: round_to(max_drawdown, 1),
        avg_win: round_to(avg_win, 2),
        avg_loss: round_to(avg_loss, 2),
        total_trades: trades.len(),
        profitable_trades: wins.len(),
        losing_trades: losses.len(),
    }
}

/// Saved strategy record: configuration plus the results it was saved with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStrategy {
    pub id: String,
    pub name: String,
    pub config: StrategyConfig,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtest_results: Option<BacktestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_at: Option<String>,
}

/// Durable strategy library, newest first.
pub struct StrategyLibrary {
    kv: KvStore,
}

impl StrategyLibrary {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn list(&self) -> Vec<SavedStrategy> {
        self.kv
            .load(KEY_STRATEGIES)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    fn store(&self, strategies: &[SavedStrategy]) {
        match serde_json::to_value(strategies) {
            Ok(value) => self.kv.save(KEY_STRATEGIES, &value),
            Err(e) => tracing::warn!(error = %e, "failed to encode strategy library"),
        }
    }

    pub fn save(
        &self,
        name: &str,
        config: StrategyConfig,
        backtest_results: Option<BacktestResult>,
    ) -> SavedStrategy {
        let strategy = SavedStrategy {
            id: generate_id(),
            name: name.to_string(),
            config,
            created_at: chrono::Utc::now().to_rfc3339(),
            backtest_results,
            imported_at: None,
        };

        let mut strategies = self.list();
        strategies.insert(0, strategy.clone());
        self.store(&strategies);
        info!(name, id = %strategy.id, "strategy saved to library");
        strategy
    }

    pub fn load(&self, id: &str) -> Option<SavedStrategy> {
        self.list().into_iter().find(|s| s.id == id)
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut strategies = self.list();
        let before = strategies.len();
        strategies.retain(|s| s.id != id);
        let removed = strategies.len() < before;
        if removed {
            self.store(&strategies);
            info!(id, "strategy deleted from library");
        }
        removed
    }

    /// Export blob with the standard header fields.
    pub fn export(&self, strategy: &SavedStrategy) -> Result<Value> {
        let payload = serde_json::to_value(strategy)?;
        Ok(crate::persistence::export_blob("strategy", payload))
    }

    /// Import a previously exported strategy (or a bare record). A new id
    /// is assigned; the original `name` and `config` are required.
    pub fn import(&self, data: Value) -> Result<SavedStrategy> {
        // Accept both a raw record and a full export blob
        let record = data.get("data").cloned().unwrap_or(data);
        let name = record
            .get("name")
            .and_then(|v| v.as_str())
            .context("strategy file missing 'name'")?
            .to_string();
        let config: StrategyConfig = serde_json::from_value(
            record
                .get("config")
                .cloned()
                .context("strategy file missing 'config'")?,
        )
        .context("invalid strategy config")?;
        let backtest_results = record
            .get("backtestResults")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        let strategy = SavedStrategy {
            id: generate_id(),
            name,
            config,
            created_at: record
                .get("createdAt")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
            backtest_results,
            imported_at: Some(chrono::Utc::now().to_rfc3339()),
        };

        let mut strategies = self.list();
        strategies.insert(0, strategy.clone());
        self.store(&strategies);
        info!(name = %strategy.name, "strategy imported");
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Emotion, TradeSide};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn trade(profit: f64) -> Trade {
        Trade {
            id: generate_id(),
            market: "BTC".to_string(),
            side: TradeSide::Buy,
            entry: 100.0,
            exit: Some(100.0 + profit),
            stop_loss: 95.0,
            target: 110.0,
            size: 1.0,
            emotion: Emotion::Neutral,
            notes: String::new(),
            timestamp: 0,
            profit,
        }
    }

    #[test]
    fn test_backtest_results_within_ranges() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let r = run_backtest(&mut rng, &StrategyConfig::default());
            assert!((60.0..=85.0).contains(&r.win_rate));
            assert!((50..=200).contains(&r.total_trades));
            assert_eq!(r.profitable_trades + r.losing_trades, r.total_trades);
            assert!((1000.0..5000.0).contains(&r.net_pl));
            assert!((-15.0..=-5.0).contains(&r.max_drawdown));
            assert!((1.2..2.5).contains(&r.profit_factor));
            assert!(r.simulated, "backtests are labeled as simulated");
        }
    }

    #[test]
    fn test_backtest_is_reproducible_with_seed() {
        let config = StrategyConfig::default();
        let a = run_backtest(&mut StdRng::seed_from_u64(11), &config);
        let b = run_backtest(&mut StdRng::seed_from_u64(11), &config);
        assert_eq!(a.win_rate, b.win_rate);
        assert_eq!(a.net_pl, b.net_pl);
    }

    #[test]
    fn test_equity_curve_shape() {
        let mut rng = StdRng::seed_from_u64(2);
        let curve = equity_curve(&mut rng, 10_000.0, 100);
        assert_eq!(curve.len(), 100);
        assert_eq!(curve[0].time, 0);
        assert_eq!(curve[99].time, 99);
        // Each step moves at most ±1.1%
        for w in curve.windows(2) {
            let ratio = w[1].equity / w[0].equity;
            assert!((0.989..=1.011).contains(&ratio));
        }
    }

    fn flat_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                time: i as i64 * 60_000,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_rsi_oversold_signal() {
        // Strictly falling closes keep RSI at 0, well under 30
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let candles = flat_candles(&closes);
        let config = StrategyConfig {
            indicator: Indicator::Rsi,
            entry_condition: EntryCondition::Oversold,
            period: 14,
            ..StrategyConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let signals = generate_trade_signals(&mut rng, &candles, &config);
        assert!(!signals.is_empty());
        assert!(signals.iter().all(|s| s.action == SignalAction::Buy));
        assert!(signals.iter().all(|s| (0.5..=1.0).contains(&s.confidence)));
        assert!(signals.iter().all(|s| s.index >= config.period));
    }

    #[test]
    fn test_ema_cross_above_signal() {
        // Rising closes sit above their EMA
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let candles = flat_candles(&closes);
        let config = StrategyConfig {
            indicator: Indicator::Ema,
            entry_condition: EntryCondition::CrossAbove,
            period: 14,
            ..StrategyConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let signals = generate_trade_signals(&mut rng, &candles, &config);
        assert!(!signals.is_empty());
        assert!(signals.iter().all(|s| s.action == SignalAction::Buy));
    }

    #[test]
    fn test_mismatched_condition_yields_no_signals() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let candles = flat_candles(&closes);
        // Overbought condition on a falling market never fires
        let config = StrategyConfig {
            indicator: Indicator::Rsi,
            entry_condition: EntryCondition::Overbought,
            period: 14,
            ..StrategyConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(generate_trade_signals(&mut rng, &candles, &config).is_empty());
    }

    #[test]
    fn test_short_series_yields_no_signals() {
        let candles = flat_candles(&[100.0, 101.0]);
        let mut rng = StdRng::seed_from_u64(1);
        let signals =
            generate_trade_signals(&mut rng, &candles, &StrategyConfig::default());
        assert!(signals.is_empty());
    }

    #[test]
    fn test_metrics_empty_trades() {
        let m = strategy_metrics(&[]);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.total_trades, 0);
    }

    #[test]
    fn test_metrics_mixed_trades() {
        let trades = vec![trade(2.0), trade(4.0), trade(-1.0), trade(-2.0)];
        let m = strategy_metrics(&trades);
        assert_eq!(m.win_rate, 50.0);
        assert_eq!(m.profitable_trades, 2);
        assert_eq!(m.losing_trades, 2);
        // 6 profit over 3 loss
        assert_eq!(m.profit_factor, 2.0);
        assert_eq!(m.avg_win, 3.0);
        assert_eq!(m.avg_loss, 1.5);
        // 0.5*3 - 0.5*1.5
        assert_eq!(m.expectancy, 0.75);
    }

    #[test]
    fn test_metrics_all_wins_infinite_profit_factor() {
        let trades = vec![trade(1.0), trade(2.0)];
        let m = strategy_metrics(&trades);
        assert!(m.profit_factor.is_infinite());
        assert_eq!(m.win_rate, 100.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn test_metrics_breakeven_counts_as_loss() {
        let trades = vec![trade(0.0), trade(1.0)];
        let m = strategy_metrics(&trades);
        assert_eq!(m.profitable_trades, 1);
        assert_eq!(m.losing_trades, 1);
        assert_eq!(m.win_rate, 50.0);
    }

    fn library() -> (StrategyLibrary, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::open(dir.path()).unwrap();
        (StrategyLibrary::new(kv), dir)
    }

    #[test]
    fn test_library_save_is_newest_first() {
        let (lib, _dir) = library();
        lib.save("First", StrategyConfig::default(), None);
        lib.save("Second", StrategyConfig::default(), None);
        let list = lib.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Second");
        assert_eq!(list[1].name, "First");
    }

    #[test]
    fn test_library_load_and_delete() {
        let (lib, _dir) = library();
        let saved = lib.save("Momentum", StrategyConfig::default(), None);
        assert_eq!(lib.load(&saved.id).unwrap().name, "Momentum");
        assert!(lib.delete(&saved.id));
        assert!(lib.load(&saved.id).is_none());
        assert!(!lib.delete(&saved.id), "second delete is a no-op");
    }

    #[test]
    fn test_library_export_import_roundtrip() {
        let (lib, _dir) = library();
        let mut rng = StdRng::seed_from_u64(9);
        let results = run_backtest(&mut rng, &StrategyConfig::default());
        let saved = lib.save("Swing", StrategyConfig::default(), Some(results));

        let blob = lib.export(&saved).unwrap();
        assert_eq!(blob["kind"], "strategy");

        let imported = lib.import(blob).unwrap();
        assert_eq!(imported.name, "Swing");
        assert_ne!(imported.id, saved.id, "import assigns a fresh id");
        assert!(imported.imported_at.is_some());
        assert!(imported.backtest_results.is_some());
    }

    #[test]
    fn test_import_rejects_invalid_payload() {
        let (lib, _dir) = library();
        let err = lib.import(serde_json::json!({"junk": true})).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_backtest_results_land_in_store() {
        let store = crate::store::Store::new();
        assert_eq!(
            store.get("strategy.backtestResults"),
            Some(serde_json::Value::Null)
        );

        let mut rng = StdRng::seed_from_u64(21);
        let result = run_backtest_into_store(&mut rng, &store).unwrap();

        let stored = store.get("strategy.backtestResults").unwrap();
        assert_eq!(stored["simulated"], true);
        assert_eq!(stored["winRate"], result.win_rate);
    }
}
