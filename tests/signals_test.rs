//! Signal history tracker tests
//!
//! Tests cover:
//! - Record creation from emitted signals
//! - One-time resolution for BUY and SELL records
//! - Success rate and average profit
//! - Persistence across restarts

use cryptoscope::config::ScoringConfig;
use cryptoscope::services::{SignalHistory, SqliteStore};
use cryptoscope::types::*;
use std::sync::Arc;

fn history() -> Arc<SignalHistory> {
    let sqlite = Arc::new(SqliteStore::new_in_memory().unwrap());
    SignalHistory::new(sqlite, &ScoringConfig::default())
}

fn signal(symbol: &str, action: SignalAction, price: f64) -> Signal {
    let mut signal = Signal::none(symbol, price, "test");
    signal.action = action;
    if action == SignalAction::Buy {
        signal.stop_loss = Some(price * 0.99);
        signal.target_1 = Some(price * 1.02);
        signal.target_2 = Some(price * 1.03);
    }
    signal
}

#[test]
fn test_success_rate_zero_without_records() {
    let history = history();
    assert_eq!(history.success_rate(SignalAction::Buy), 0.0);
    assert_eq!(history.success_rate(SignalAction::Sell), 0.0);
}

#[test]
fn test_success_rate_hundred_when_all_buys_succeed() {
    let history = history();
    for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
        history.track(&signal(symbol, SignalAction::Buy, 100.0)).unwrap();
    }
    for symbol in ["BTCUSDT", "ETHUSDT", "SOLUSDT"] {
        let resolved = history.observe(symbol, 102.5);
        assert_eq!(resolved.len(), 1);
    }

    assert_eq!(history.success_rate(SignalAction::Buy), 100.0);
    let stats = history.stats();
    assert_eq!(stats.successful, 3);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.success_rate_by_type["BUY"], 100.0);
    assert!((stats.average_profit - 2.5).abs() < 1e-9);
}

#[test]
fn test_buy_record_uses_signal_levels() {
    let history = history();
    let record = history.track(&signal("BTCUSDT", SignalAction::Buy, 200.0)).unwrap();
    assert_eq!(record.signal_type, SignalAction::Buy);
    assert_eq!(record.status, SignalStatus::Pending);
    assert!((record.target_price - 204.0).abs() < 1e-9);
    assert!((record.stop_loss - 198.0).abs() < 1e-9);
}

#[test]
fn test_sell_record_resolves_short_side() {
    let history = history();
    history.track(&signal("ETHUSDT", SignalAction::Sell, 100.0)).unwrap();

    // Rising price is a loss for a SELL, but not past its stop yet.
    assert!(history.observe("ETHUSDT", 100.5).is_empty());

    let resolved = history.observe("ETHUSDT", 97.0);
    assert_eq!(resolved[0].status, SignalStatus::Successful);
    assert!((resolved[0].result_pct.unwrap() - 3.0).abs() < 1e-9);
    assert_eq!(history.success_rate(SignalAction::Sell), 100.0);
}

#[test]
fn test_terminal_status_never_changes() {
    let history = history();
    history.track(&signal("BTCUSDT", SignalAction::Buy, 100.0)).unwrap();
    history.observe("BTCUSDT", 98.0);
    history.observe("BTCUSDT", 120.0);

    let records = history.records(Some("BTCUSDT"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, SignalStatus::Failed);
    assert_eq!(records[0].exit_price, Some(98.0));
    assert_eq!(history.stats().successful, 0);
}

#[test]
fn test_pending_records_count_toward_rate() {
    let history = history();
    history.track(&signal("BTCUSDT", SignalAction::Buy, 100.0)).unwrap();
    history.track(&signal("ETHUSDT", SignalAction::Buy, 100.0)).unwrap();
    history.observe("BTCUSDT", 103.0);

    assert_eq!(history.success_rate(SignalAction::Buy), 50.0);
    // Only the resolved record contributes to the average.
    assert!((history.average_profit() - 3.0).abs() < 1e-9);
}

#[test]
fn test_observing_other_symbol_does_nothing() {
    let history = history();
    history.track(&signal("BTCUSDT", SignalAction::Buy, 100.0)).unwrap();
    assert!(history.observe("ETHUSDT", 1.0).is_empty());
    assert_eq!(history.stats().pending, 1);
}

#[test]
fn test_history_survives_restart() {
    let sqlite = Arc::new(SqliteStore::new_in_memory().unwrap());
    let history = SignalHistory::new(sqlite.clone(), &ScoringConfig::default());
    history.track(&signal("BTCUSDT", SignalAction::Buy, 100.0)).unwrap();
    history.track(&signal("ETHUSDT", SignalAction::Sell, 100.0)).unwrap();
    history.observe("ETHUSDT", 101.0);

    let restored = SignalHistory::new(sqlite, &ScoringConfig::default());
    assert_eq!(restored.load(), 2);
    assert_eq!(restored.stats(), history.stats());

    // Pending records keep resolving after the restart.
    assert_eq!(restored.observe("BTCUSDT", 102.0).len(), 1);
    assert_eq!(restored.success_rate(SignalAction::Buy), 100.0);
}
