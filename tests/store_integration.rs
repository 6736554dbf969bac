//! End-to-end tests across the store, journal, risk and persistence layers

#[cfg(test)]
mod tests {
    use marketmind::journal::{self, TradeInput};
    use marketmind::persistence::KvStore;
    use marketmind::store::Store;
    use marketmind::strategy::StrategyLibrary;
    use marketmind::types::{Emotion, StrategyConfig, TradeSide};
    use serde_json::json;
    use std::sync::Arc;

    fn trade_input(market: &str, entry: f64, exit: Option<f64>) -> TradeInput {
        TradeInput {
            market: market.to_string(),
            side: TradeSide::Buy,
            entry,
            exit,
            stop_loss: entry * 0.95,
            target: entry * 1.1,
            size: 1.0,
            emotion: Emotion::Neutral,
            notes: String::new(),
        }
    }

    // ============================================================================
    // Journal flow through the reactive store
    // ============================================================================

    #[test]
    fn test_journal_lifecycle_drives_performance_panel() {
        let store = Arc::new(Store::new());
        store.wire_subscriptions();

        let winner = journal::add_trade(&store, trade_input("BTC", 100.0, Some(110.0))).unwrap();
        journal::add_trade(&store, trade_input("GOLD", 200.0, Some(190.0))).unwrap();

        let perf = store.get("performance").unwrap();
        assert_eq!(perf["totalTrades"], json!(2));
        assert_eq!(perf["winRate"], json!(50.0));
        assert_eq!(perf["netPL"], json!(5.0));

        // Removing the winner moves the panel with it
        journal::delete_trade(&store, &winner.id).unwrap();
        let perf = store.get("performance").unwrap();
        assert_eq!(perf["totalTrades"], json!(1));
        assert_eq!(perf["winRate"], json!(0.0));
    }

    #[test]
    fn test_risk_panel_follows_input_updates() {
        let store = Arc::new(Store::new());
        store.wire_subscriptions();

        store.update("risk.capital", json!(20000.0)).unwrap();
        store.update("risk.riskPercent", json!(2.0)).unwrap();
        store.update("risk.stopLoss", json!(4.0)).unwrap();

        let risk = store.get("risk").unwrap();
        // 20000 * 2% = 400 at risk; position covers it with a 4% stop
        assert_eq!(risk["riskAmount"], json!(400.0));
        assert_eq!(risk["positionSize"], json!(10000.0));
        assert_eq!(risk["maxLoss"], json!(-400.0));
        assert_eq!(risk["maxGain"], json!(800.0));
    }

    // ============================================================================
    // Persistence across restarts
    // ============================================================================

    #[test]
    fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        {
            let kv = KvStore::open(dir.path()).unwrap();
            let store = Arc::new(Store::with_persistence(kv));
            store.wire_subscriptions();

            journal::add_trade(&store, trade_input("BTC", 100.0, Some(105.0))).unwrap();
            store.update("risk.capital", json!(25000.0)).unwrap();
            store.toggle_theme();
            // Live quotes must not outlive the session
            store
                .update("markets.BTC.price", json!(68000.0))
                .unwrap();
        }

        let kv = KvStore::open(dir.path()).unwrap();
        let store = Arc::new(Store::with_persistence(kv));
        store.wire_subscriptions();

        let trades = journal::trades(&store);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].market, "BTC");
        assert_eq!(store.get("risk.capital"), Some(json!(25000.0)));
        assert_eq!(store.get("theme"), Some(json!("light")));
        assert_ne!(
            store.get("markets.BTC.price"),
            Some(json!(68000.0)),
            "market quotes are volatile"
        );
    }

    #[test]
    fn test_restart_recomputes_performance_from_trades() {
        let dir = tempfile::tempdir().unwrap();

        {
            let kv = KvStore::open(dir.path()).unwrap();
            let store = Arc::new(Store::with_persistence(kv));
            store.wire_subscriptions();
            journal::add_trade(&store, trade_input("BTC", 100.0, Some(110.0))).unwrap();
        }

        let kv = KvStore::open(dir.path()).unwrap();
        let store = Arc::new(Store::with_persistence(kv));
        store.wire_subscriptions();

        journal::refresh_performance(&store, &store.get("journal.trades").unwrap());
        let perf = store.get("performance").unwrap();
        assert_eq!(perf["totalTrades"], json!(1));
        assert_eq!(perf["winRate"], json!(100.0));
    }

    // ============================================================================
    // Strategy library round-trips
    // ============================================================================

    #[test]
    fn test_strategy_library_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let saved = {
            let library = StrategyLibrary::new(KvStore::open(dir.path()).unwrap());
            library.save("RSI swing", StrategyConfig::default(), None)
        };

        let library = StrategyLibrary::new(KvStore::open(dir.path()).unwrap());
        let listed = library.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].name, "RSI swing");

        assert!(library.delete(&saved.id));
        assert!(library.list().is_empty());
    }

    #[test]
    fn test_strategy_export_import_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let library = StrategyLibrary::new(KvStore::open(dir.path()).unwrap());

        let saved = library.save("Breakout", StrategyConfig::default(), None);
        let blob = library.export(&saved).unwrap();
        assert_eq!(blob["kind"], "strategy");

        let imported = library.import(blob).unwrap();
        assert_eq!(imported.name, "Breakout");
        assert_ne!(imported.id, saved.id, "imports get a fresh id");
        assert!(imported.imported_at.is_some());
        assert_eq!(library.list().len(), 2);
    }
}
