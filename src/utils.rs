//! Formatting and series-math helpers shared across the crate.

use chrono::Utc;
use rand::Rng;

use crate::types::Candle;

/// Format a price with decimal places appropriate for its magnitude.
pub fn format_price(price: f64) -> String {
    if price >= 1000.0 {
        format!("${}", group_thousands(price, 2))
    } else if price >= 1.0 {
        format!("${:.4}", price)
    } else {
        let s = format!("{:.8}", price);
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        format!("${}", trimmed)
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };
    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    let offset = digits.len() % 3;
    for (i, c) in digits.iter().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    match frac_part {
        Some(f) => format!("{}.{}", grouped, f),
        None => grouped,
    }
}

/// Signed percentage, e.g. "+2.34%"
pub fn format_percent(value: f64) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, value)
}

/// Compact volume/market-cap formatting ("$1.3B", "$45.2M")
pub fn format_large_number(num: f64) -> String {
    if num >= 1e9 {
        format!("${:.1}B", num / 1e9)
    } else if num >= 1e6 {
        format!("${:.1}M", num / 1e6)
    } else if num >= 1e3 {
        format!("${:.1}K", num / 1e3)
    } else {
        format!("${:.0}", num)
    }
}

/// Compact duration, largest unit only ("2d", "3h", "45m", "12s")
pub fn format_duration(ms: i64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    if days > 0 {
        format!("{}d", days)
    } else if hours > 0 {
        format!("{}h", hours)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

/// Percentage change from `old` to `new`
pub fn calculate_change(old: f64, new: f64) -> f64 {
    (new - old) / old * 100.0
}

/// Round to `decimals` places (matches display-grade rounding of metrics)
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Simple moving average series; `None` until the window fills.
pub fn moving_average(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        if i + 1 < period {
            out.push(None);
        } else {
            let sum: f64 = data[i + 1 - period..=i].iter().sum();
            out.push(Some(sum / period as f64));
        }
    }
    out
}

/// RSI over the first `period` changes of a window. Neutral 50 when the
/// window is too short, 100 when there are no losses.
pub fn simple_rsi(prices: &[f64], period: usize) -> f64 {
    if prices.len() < 2 || period == 0 {
        return 50.0;
    }
    let span = period.min(prices.len() - 1);
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in 1..=span {
        let change = prices[i] - prices[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }
    let avg_gain = gains / span as f64;
    let avg_loss = losses / span as f64;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// RSI series from a close series; `None` for the warm-up prefix.
pub fn rsi_series(data: &[f64], period: usize) -> Vec<Option<f64>> {
    if data.len() < 2 {
        return vec![None; data.len()];
    }
    let changes: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|c| (-c).max(0.0)).collect();
    let avg_gain = moving_average(&gains, period);
    let avg_loss = moving_average(&losses, period);

    let mut out = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        if i < period {
            out.push(None);
        } else {
            match (avg_gain[i - 1], avg_loss[i - 1]) {
                (Some(g), Some(l)) if l > 0.0 => {
                    let rs = g / l;
                    out.push(Some(100.0 - (100.0 / (1.0 + rs))));
                }
                (Some(_), Some(_)) => out.push(Some(100.0)),
                _ => out.push(None),
            }
        }
    }
    out
}

/// Exponential moving average of a window, seeded on the first element.
pub fn ema(prices: &[f64], period: usize) -> f64 {
    match prices {
        [] => 0.0,
        [.., last] if prices.len() < period => *last,
        _ => {
            let multiplier = 2.0 / (period as f64 + 1.0);
            let mut value = prices[0];
            for price in &prices[1..] {
                value = (price - value) * multiplier + value;
            }
            value
        }
    }
}

/// Random-walk candle series ending at `now`, one bucket per
/// `step_ms` milliseconds, +/- `volatility` fraction per bar.
pub fn generate_candle_data<R: Rng>(
    rng: &mut R,
    count: usize,
    base_price: f64,
    volatility: f64,
    step_ms: i64,
) -> Vec<Candle> {
    let mut data = Vec::with_capacity(count);
    let mut current = base_price;
    let now = Utc::now().timestamp_millis();

    for i in (0..count).rev() {
        let time = now - i as i64 * step_ms;
        let open = current;
        let change = (rng.gen::<f64>() - 0.5) * 2.0 * volatility * open;
        let close = open + change;
        let high = open.max(close) + rng.gen::<f64>() * volatility * open * 0.5;
        let low = open.min(close) - rng.gen::<f64>() * volatility * open * 0.5;
        let volume = rng.gen::<f64>() * 1000.0 + 500.0;
        data.push(Candle {
            time,
            open,
            high,
            low,
            close,
            volume,
        });
        current = close;
    }
    data
}

/// Opaque unique id for trades, strategies and notifications.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
