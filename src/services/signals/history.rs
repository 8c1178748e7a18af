//! Outcome tracking for emitted signals.
//!
//! Every actionable signal becomes a pending [`SignalRecord`]. Later price
//! observations resolve it exactly once to successful or failed; records are
//! never deleted.

use crate::config::ScoringConfig;
use crate::services::SqliteStore;
use crate::types::{
    Signal, SignalAction, SignalRecord, SignalStats, SignalStatus, normalize_symbol,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy)]
struct TypeCounts {
    total: u64,
    successful: u64,
}

/// Counters mutated together with record transitions.
#[derive(Debug, Default)]
struct Counters {
    total: u64,
    successful: u64,
    failed: u64,
    pending: u64,
    resolved_profit_sum: f64,
    by_type: HashMap<SignalAction, TypeCounts>,
}

impl Counters {
    fn on_created(&mut self, record: &SignalRecord) {
        self.total += 1;
        self.by_type.entry(record.signal_type).or_default().total += 1;
        match record.status {
            SignalStatus::Pending => self.pending += 1,
            _ => self.on_terminal(record),
        }
    }

    fn on_resolved(&mut self, record: &SignalRecord) {
        self.pending = self.pending.saturating_sub(1);
        self.on_terminal(record);
    }

    fn on_terminal(&mut self, record: &SignalRecord) {
        match record.status {
            SignalStatus::Successful => {
                self.successful += 1;
                self.by_type.entry(record.signal_type).or_default().successful += 1;
            }
            SignalStatus::Failed => self.failed += 1,
            SignalStatus::Pending => return,
        }
        self.resolved_profit_sum += record.result_pct.unwrap_or(0.0);
    }

    fn success_rate(&self, signal_type: SignalAction) -> f64 {
        match self.by_type.get(&signal_type) {
            Some(c) if c.total > 0 => c.successful as f64 / c.total as f64 * 100.0,
            _ => 0.0,
        }
    }

    fn average_profit(&self) -> f64 {
        let resolved = self.successful + self.failed;
        if resolved == 0 {
            0.0
        } else {
            self.resolved_profit_sum / resolved as f64
        }
    }
}

/// Ledger of tracked signals keyed by symbol.
pub struct SignalHistory {
    /// Records per symbol, oldest first.
    records: DashMap<String, Vec<SignalRecord>>,
    counters: Mutex<Counters>,
    sqlite: Arc<SqliteStore>,
    sell_stop_pct: f64,
    sell_target_pct: f64,
}

impl SignalHistory {
    /// Create an empty tracker.
    pub fn new(sqlite: Arc<SqliteStore>, config: &ScoringConfig) -> Arc<Self> {
        Arc::new(Self {
            records: DashMap::new(),
            counters: Mutex::new(Counters::default()),
            sqlite,
            sell_stop_pct: config.sell_stop_pct,
            sell_target_pct: config.sell_target_pct,
        })
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restore records from SQLite. Returns the number loaded.
    pub fn load(&self) -> usize {
        let records = match self.sqlite.load_signal_records() {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to load signal records: {}", e);
                return 0;
            }
        };

        let count = records.len();
        for record in records {
            let mut entry = self.records.entry(record.symbol.clone()).or_default();
            self.counters().on_created(&record);
            entry.push(record);
        }
        info!("Loaded {} signal records", count);
        count
    }

    /// Track an emitted signal.
    ///
    /// Returns the new record, or `None` when the signal is not actionable or a
    /// pending record of the same type already exists for the symbol.
    pub fn track(&self, signal: &Signal) -> Option<SignalRecord> {
        let price = signal.entry_price;
        let (target, stop) = match signal.action {
            SignalAction::Buy => (
                signal.target_1.unwrap_or(price * (1.0 + self.sell_target_pct)),
                signal.stop_loss.unwrap_or(price * (1.0 - self.sell_stop_pct)),
            ),
            SignalAction::Sell => (
                price * (1.0 - self.sell_target_pct),
                price * (1.0 + self.sell_stop_pct),
            ),
            SignalAction::None => return None,
        };

        let symbol = normalize_symbol(&signal.symbol);
        let mut entry = self.records.entry(symbol.clone()).or_default();
        let duplicate = entry
            .iter()
            .any(|r| r.status == SignalStatus::Pending && r.signal_type == signal.action);
        if duplicate {
            debug!("{} {} already pending, not tracking again", symbol, signal.action);
            return None;
        }

        let record = SignalRecord::new(symbol, signal.action, price, target, stop)?;
        self.insert_locked(&mut entry, record.clone());
        Some(record)
    }

    fn insert_locked(&self, records: &mut Vec<SignalRecord>, record: SignalRecord) {
        self.counters().on_created(&record);
        if let Err(e) = self.sqlite.save_signal_record(&record) {
            error!("Failed to persist signal record {}: {}", record.id, e);
        }
        info!(
            "Tracking {} signal for {} at {:.4} (target {:.4}, stop {:.4})",
            record.signal_type, record.symbol, record.entry_price, record.target_price, record.stop_loss
        );
        records.push(record);
    }

    /// Resolve pending records of `symbol` against `price`.
    ///
    /// Returns the records that transitioned on this observation.
    pub fn observe(&self, symbol: &str, price: f64) -> Vec<SignalRecord> {
        if !price.is_finite() || price <= 0.0 {
            return Vec::new();
        }
        let Some(mut entry) = self.records.get_mut(&normalize_symbol(symbol)) else {
            return Vec::new();
        };

        let mut resolved = Vec::new();
        for record in entry.iter_mut() {
            if !record.resolve(price) {
                continue;
            }
            self.counters().on_resolved(record);
            if let Err(e) = self.sqlite.save_signal_record(record) {
                error!("Failed to persist signal record {}: {}", record.id, e);
            }
            info!(
                "{} {} signal {:?} at {:.4} ({:+.2}%)",
                record.symbol,
                record.signal_type,
                record.status,
                price,
                record.result_pct.unwrap_or(0.0)
            );
            resolved.push(record.clone());
        }
        resolved
    }

    /// Percentage of successful records among all records of `signal_type`.
    pub fn success_rate(&self, signal_type: SignalAction) -> f64 {
        self.counters().success_rate(signal_type)
    }

    /// Mean result over resolved records (0 if none).
    pub fn average_profit(&self) -> f64 {
        self.counters().average_profit()
    }

    /// Snapshot of all counters.
    pub fn stats(&self) -> SignalStats {
        let counters = self.counters();
        let success_rate_by_type = [SignalAction::Buy, SignalAction::Sell]
            .into_iter()
            .map(|t| (t.label().to_string(), counters.success_rate(t)))
            .collect();

        SignalStats {
            total: counters.total,
            successful: counters.successful,
            failed: counters.failed,
            pending: counters.pending,
            average_profit: counters.average_profit(),
            success_rate_by_type,
        }
    }

    /// Records for one symbol, or all symbols, newest first.
    pub fn records(&self, symbol: Option<&str>) -> Vec<SignalRecord> {
        let mut out: Vec<SignalRecord> = match symbol {
            Some(symbol) => self
                .records
                .get(&normalize_symbol(symbol))
                .map(|r| r.clone())
                .unwrap_or_default(),
            None => self
                .records
                .iter()
                .flat_map(|entry| entry.value().clone())
                .collect(),
        };
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// Symbols with at least one pending record.
    pub fn pending_symbols(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|entry| entry.value().iter().any(|r| r.status == SignalStatus::Pending))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Arc<SignalHistory> {
        let sqlite = Arc::new(SqliteStore::new_in_memory().unwrap());
        SignalHistory::new(sqlite, &ScoringConfig::default())
    }

    fn buy_signal(symbol: &str, price: f64) -> Signal {
        let mut signal = Signal::none(symbol, price, "test");
        signal.action = SignalAction::Buy;
        signal.stop_loss = Some(price * 0.99);
        signal.target_1 = Some(price * 1.02);
        signal.target_2 = Some(price * 1.03);
        signal
    }

    fn sell_signal(symbol: &str, price: f64) -> Signal {
        let mut signal = Signal::none(symbol, price, "test");
        signal.action = SignalAction::Sell;
        signal
    }

    #[test]
    fn test_empty_history_rates_are_zero() {
        let history = history();
        assert_eq!(history.success_rate(SignalAction::Buy), 0.0);
        assert_eq!(history.average_profit(), 0.0);
        let stats = history.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate_by_type.get("BUY"), Some(&0.0));
    }

    #[test]
    fn test_none_signal_not_tracked() {
        let history = history();
        assert!(history.track(&Signal::none("BTC", 1.0, "x")).is_none());
        assert_eq!(history.stats().total, 0);
    }

    #[test]
    fn test_duplicate_pending_is_skipped() {
        let history = history();
        assert!(history.track(&buy_signal("BTCUSDT", 100.0)).is_some());
        assert!(history.track(&buy_signal("BTCUSDT", 101.0)).is_none());
        // A different type is still tracked.
        assert!(history.track(&sell_signal("BTCUSDT", 101.0)).is_some());
        assert_eq!(history.stats().pending, 2);
    }

    #[test]
    fn test_sell_levels_are_mirrored() {
        let history = history();
        let record = history.track(&sell_signal("ETHUSDT", 100.0)).unwrap();
        assert!((record.target_price - 98.0).abs() < 1e-9);
        assert!((record.stop_loss - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolution_updates_counters() {
        let history = history();
        history.track(&buy_signal("BTCUSDT", 100.0));
        history.track(&sell_signal("ETHUSDT", 100.0));

        assert!(history.observe("BTCUSDT", 100.5).is_empty());
        let resolved = history.observe("BTCUSDT", 102.0);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].status, SignalStatus::Successful);

        let resolved = history.observe("ETHUSDT", 101.0);
        assert_eq!(resolved[0].status, SignalStatus::Failed);

        let stats = history.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert!((stats.average_profit - 0.5).abs() < 1e-9);
        assert_eq!(history.success_rate(SignalAction::Buy), 100.0);
        assert_eq!(history.success_rate(SignalAction::Sell), 0.0);
    }

    #[test]
    fn test_resolution_happens_once() {
        let history = history();
        history.track(&buy_signal("BTCUSDT", 100.0));
        assert_eq!(history.observe("BTCUSDT", 98.0).len(), 1);
        assert!(history.observe("BTCUSDT", 110.0).is_empty());
        assert_eq!(history.stats().failed, 1);
        assert_eq!(history.stats().successful, 0);
    }

    #[test]
    fn test_reload_restores_counters() {
        let sqlite = Arc::new(SqliteStore::new_in_memory().unwrap());
        let history = SignalHistory::new(sqlite.clone(), &ScoringConfig::default());
        history.track(&buy_signal("BTCUSDT", 100.0));
        history.observe("BTCUSDT", 103.0);
        history.track(&buy_signal("BTCUSDT", 103.0));

        let restored = SignalHistory::new(sqlite, &ScoringConfig::default());
        assert_eq!(restored.load(), 2);
        let stats = restored.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(restored.pending_symbols(), vec!["BTCUSDT".to_string()]);
    }
}
