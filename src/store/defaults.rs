//! Default state tree, seeded with the same markets and panel defaults the
//! dashboard ships with before any live data or persisted snapshot arrives.

use serde_json::{json, Value};

pub fn default_tree() -> Value {
    json!({
        "theme": "dark",

        "activeMarket": "BTC",
        "markets": {
            "BTC": {
                "name": "Bitcoin",
                "symbol": "BTC/USD",
                "price": 65234.56,
                "change": 2.34,
                "changePercent": 0,
                "volume": 32456789012u64,
                "marketCap": 1.28e12,
                "high24h": 65420.12,
                "low24h": 64890.34,
                "open": 63750.89,
                "volatility": "High",
                "status": "open",
                "sentiment": "bullish"
            },
            "GOLD": {
                "name": "Gold",
                "symbol": "XAU/USD",
                "price": 2345.67,
                "change": -0.45,
                "changePercent": 0,
                "volume": 128456789012u64,
                "marketCap": 13.5e12,
                "high24h": 2350.12,
                "low24h": 2338.90,
                "open": 2356.23,
                "volatility": "Low",
                "status": "open",
                "sentiment": "neutral"
            },
            "NIFTY": {
                "name": "Nifty 50",
                "symbol": "NIFTY",
                "price": 22450.75,
                "change": 0.89,
                "changePercent": 0,
                "volume": 45234567890u64,
                "marketCap": 2.1e12,
                "high24h": 22510.23,
                "low24h": 22380.45,
                "open": 22252.34,
                "volatility": "Medium",
                "status": "open",
                "sentiment": "bullish"
            },
            "BANKNIFTY": {
                "name": "Bank Nifty",
                "symbol": "BANKNIFTY",
                "price": 48234.56,
                "change": 1.23,
                "changePercent": 0,
                "volume": 28765432109u64,
                "marketCap": 1.8e12,
                "high24h": 48345.67,
                "low24h": 47980.12,
                "open": 47650.34,
                "volatility": "High",
                "status": "closed",
                "sentiment": "bullish"
            }
        },

        "chart": {
            "timeframe": "1m",
            "drawingMode": false,
            "drawings": [],
            "indicators": [],
            "crosshair": { "x": 0, "y": 0, "visible": false }
        },

        "strategy": {
            "indicator": "RSI",
            "entryCondition": "cross_above",
            "exitCondition": "trailing_stop",
            "riskReward": "1:2",
            "period": 14,
            "successTarget": 65,
            "backtestResults": null
        },

        "journal": {
            "trades": [],
            "filters": {
                "market": "all",
                "dateRange": "all",
                "side": "all",
                "emotion": "all"
            },
            "sortBy": "date",
            "sortOrder": "desc",
            "currentPage": 1,
            "pageSize": 10
        },

        "risk": {
            "capital": 10000,
            "riskPercent": 1,
            "stopLoss": 2,
            "positionSize": 0,
            "riskScore": 24,
            "warnings": []
        },

        "ui": {
            "loading": false,
            "activeModal": null,
            "notifications": [],
            "shortcutsVisible": false
        },

        "performance": {
            "winRate": 0,
            "totalTrades": 0,
            "netPL": 0,
            "sharpeRatio": 0,
            "maxDrawdown": 0,
            "avgWin": 0,
            "avgLoss": 0
        }
    })
}
