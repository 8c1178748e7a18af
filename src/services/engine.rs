//! Signal engine facade.
//!
//! Ties market data, scoring, the position manager and the signal history
//! together. Work for one symbol is serialized through a per-symbol async
//! lock; different symbols run in parallel.

use crate::config::{Config, ScoringConfig};
use crate::services::signals::{ScoringEngine, SignalHistory};
use crate::services::{TradingError, TradingService};
use crate::sources::{DataError, MarketData};
use crate::types::{
    OpenPositionRequest, Position, PositionEvent, PortfolioSummary, Series, Signal, SignalAction,
    SignalRecord, SignalStats, normalize_symbol,
};
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Runtime knobs for the engine, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub timeframe: String,
    pub candle_limit: usize,
    pub fetch_timeout: Duration,
    pub auto_trade: bool,
    /// Percent of free capital committed per auto-opened position.
    pub allocation_pct: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeframe: config.timeframe.clone(),
            candle_limit: config.candle_limit,
            fetch_timeout: config.fetch_timeout(),
            auto_trade: config.auto_trade,
            allocation_pct: config.trade_allocation_pct,
        }
    }
}

/// What a price tick changed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutcome {
    pub symbol: String,
    pub price: f64,
    /// `None` when no position is open for the symbol.
    pub position: Option<PositionEvent>,
    /// Signal records resolved by this price.
    pub resolved: Vec<SignalRecord>,
}

/// What processing an emitted signal did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalOutcome {
    pub record: Option<SignalRecord>,
    pub position: Option<Position>,
}

/// Signal engine.
pub struct Engine {
    market: Arc<dyn MarketData>,
    scoring: ScoringEngine,
    trading: Arc<TradingService>,
    history: Arc<SignalHistory>,
    settings: EngineSettings,
    /// Per-symbol single-writer locks.
    symbol_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(
        market: Arc<dyn MarketData>,
        scoring: ScoringConfig,
        trading: Arc<TradingService>,
        history: Arc<SignalHistory>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            market,
            scoring: ScoringEngine::new(scoring),
            trading,
            history,
            settings,
            symbol_locks: DashMap::new(),
        }
    }

    pub fn trading(&self) -> &Arc<TradingService> {
        &self.trading
    }

    pub fn history(&self) -> &Arc<SignalHistory> {
        &self.history
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        self.symbol_locks
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    async fn with_timeout<T>(
        &self,
        what: String,
        fut: impl Future<Output = Result<T, DataError>>,
    ) -> Result<T, DataError> {
        match tokio::time::timeout(self.settings.fetch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout(what)),
        }
    }

    async fn fetch_series(&self, symbol: &str) -> Result<Series, DataError> {
        self.with_timeout(
            format!("{} series", symbol),
            self.market
                .get_series(symbol, &self.settings.timeframe, self.settings.candle_limit),
        )
        .await
    }

    /// Current price from the market data source, bounded by the fetch timeout.
    pub async fn fetch_price(&self, symbol: &str) -> Result<f64, DataError> {
        self.with_timeout(format!("{} price", symbol), self.market.get_price(symbol))
            .await
    }

    // ==========================================================================
    // Core operations
    // ==========================================================================

    /// Score the latest series for `symbol`. No side effects.
    ///
    /// Indicator failures come back as a `None` signal; only data retrieval
    /// failures are errors.
    pub async fn evaluate(&self, symbol: &str) -> Result<Signal, DataError> {
        let symbol = normalize_symbol(symbol);
        let series = self.fetch_series(&symbol).await?;
        Ok(self.scoring.generate(&symbol, &series))
    }

    /// Open a position against free capital.
    pub fn open_position(&self, request: OpenPositionRequest) -> Result<Position, TradingError> {
        self.trading.open_position(request)
    }

    /// Apply a price observation to the symbol's position and pending signals.
    pub fn tick(&self, symbol: &str, price: f64) -> Result<TickOutcome, TradingError> {
        let symbol = normalize_symbol(symbol);
        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::InvalidPosition(format!(
                "invalid price {} for {}",
                price, symbol
            )));
        }

        let position = self.trading.tick(&symbol, price)?;
        let resolved = self.history.observe(&symbol, price);
        Ok(TickOutcome {
            symbol,
            price,
            position,
            resolved,
        })
    }

    pub fn portfolio_summary(&self) -> PortfolioSummary {
        self.trading.summary()
    }

    pub fn signal_stats(&self) -> SignalStats {
        self.history.stats()
    }

    /// Track an actionable signal and, with auto trading on, open a position on BUY.
    pub fn process_signal(&self, signal: &Signal) -> SignalOutcome {
        if !signal.action.is_actionable() {
            return SignalOutcome::default();
        }

        let record = self.history.track(signal);
        let position = if signal.action == SignalAction::Buy && self.settings.auto_trade {
            self.auto_open(signal)
        } else {
            None
        };

        SignalOutcome { record, position }
    }

    fn auto_open(&self, signal: &Signal) -> Option<Position> {
        let (Some(stop_loss), Some(target_1), Some(target_2)) =
            (signal.stop_loss, signal.target_1, signal.target_2)
        else {
            warn!("BUY signal for {} has no levels, not opening", signal.symbol);
            return None;
        };

        let budget = self.trading.free_capital() * self.settings.allocation_pct / 100.0;
        if signal.entry_price <= 0.0 || budget <= 0.0 {
            debug!("No capital allocated for {}", signal.symbol);
            return None;
        }

        let request = OpenPositionRequest {
            symbol: signal.symbol.clone(),
            amount: budget / signal.entry_price,
            entry_price: signal.entry_price,
            stop_loss,
            target_1,
            target_2,
        };

        match self.trading.open_position(request) {
            Ok(position) => Some(position),
            Err(TradingError::PositionExists(symbol)) => {
                debug!("Position already open for {}, BUY not merged", symbol);
                None
            }
            Err(e) => {
                warn!("Auto-open for {} rejected: {}", signal.symbol, e);
                None
            }
        }
    }

    // ==========================================================================
    // Refresh cycle
    // ==========================================================================

    /// Full cycle for one symbol: fetch, tick existing state, score, process.
    pub async fn refresh(&self, symbol: &str) -> Result<Signal, DataError> {
        let symbol = normalize_symbol(symbol);
        let lock = self.symbol_lock(&symbol);
        let _guard = lock.lock().await;

        let series = self.fetch_series(&symbol).await?;
        let price = self.fetch_price(&symbol).await?;

        match self.tick(&symbol, price) {
            Ok(outcome) => {
                if outcome.position.is_some() || !outcome.resolved.is_empty() {
                    debug!("{} tick at {:.4}: {:?}", symbol, price, outcome.position);
                }
            }
            Err(e) => error!("{} tick at {} failed: {}", symbol, price, e),
        }

        let signal = self.scoring.generate(&symbol, &series);
        if signal.action.is_actionable() {
            info!(
                "{} {} signal (strength {:.2}, score {:.2}) at {:.4}",
                symbol, signal.action, signal.strength, signal.score, signal.entry_price
            );
        }
        self.process_signal(&signal);
        Ok(signal)
    }

    /// Refresh every symbol in parallel. Failed symbols are skipped until next time.
    pub async fn refresh_all(&self, symbols: &[String]) -> Vec<Signal> {
        let results = join_all(symbols.iter().map(|s| self.refresh(s))).await;

        results
            .into_iter()
            .zip(symbols)
            .filter_map(|(result, symbol)| match result {
                Ok(signal) => Some(signal),
                Err(e) => {
                    warn!("Skipping {} this tick: {}", symbol, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::SqliteStore;
    use crate::sources::DataFuture;
    use crate::types::{PriceBar, SignalStatus};

    struct FixedSource {
        price: f64,
    }

    impl MarketData for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        fn get_series<'a>(
            &'a self,
            _symbol: &'a str,
            _timeframe: &'a str,
            limit: usize,
        ) -> DataFuture<'a, Series> {
            let price = self.price;
            Box::pin(async move {
                Ok((0..limit)
                    .map(|i| PriceBar::new(i as i64 * 60_000, price, price, price, price, 10.0))
                    .collect())
            })
        }

        fn get_price<'a>(&'a self, _symbol: &'a str) -> DataFuture<'a, f64> {
            let price = self.price;
            Box::pin(async move { Ok(price) })
        }
    }

    fn engine(auto_trade: bool) -> Engine {
        let sqlite = Arc::new(SqliteStore::new_in_memory().unwrap());
        let scoring = ScoringConfig::default();
        let trading = Arc::new(TradingService::new(sqlite.clone(), 10_000.0));
        let history = SignalHistory::new(sqlite, &scoring);
        let settings = EngineSettings {
            auto_trade,
            ..EngineSettings::default()
        };
        Engine::new(Arc::new(FixedSource { price: 100.0 }), scoring, trading, history, settings)
    }

    fn buy_signal(symbol: &str) -> Signal {
        let mut signal = Signal::none(symbol, 100.0, "test");
        signal.action = SignalAction::Buy;
        signal.stop_loss = Some(99.0);
        signal.target_1 = Some(102.0);
        signal.target_2 = Some(103.0);
        signal
    }

    #[tokio::test]
    async fn test_evaluate_has_no_side_effects() {
        let engine = engine(true);
        let signal = engine.evaluate("btcusdt").await.unwrap();
        assert_eq!(signal.symbol, "BTCUSDT");
        assert_eq!(engine.signal_stats().total, 0);
        assert_eq!(engine.portfolio_summary().open_count, 0);
    }

    #[test]
    fn test_process_buy_without_auto_trade_only_tracks() {
        let engine = engine(false);
        let outcome = engine.process_signal(&buy_signal("BTCUSDT"));
        assert!(outcome.record.is_some());
        assert!(outcome.position.is_none());
        assert_eq!(engine.signal_stats().pending, 1);
    }

    #[test]
    fn test_process_buy_with_auto_trade_opens_allocation() {
        let engine = engine(true);
        let outcome = engine.process_signal(&buy_signal("BTCUSDT"));
        let position = outcome.position.unwrap();
        // 10% of 10_000 at 100.
        assert!((position.amount - 10.0).abs() < 1e-9);
        assert!((engine.trading().free_capital() - 9_000.0).abs() < 1e-9);

        // A second BUY is neither tracked again nor merged.
        let outcome = engine.process_signal(&buy_signal("BTCUSDT"));
        assert!(outcome.record.is_none());
        assert!(outcome.position.is_none());
        assert_eq!(engine.portfolio_summary().open_count, 1);
    }

    #[test]
    fn test_tick_resolves_position_and_record() {
        let engine = engine(true);
        engine.process_signal(&buy_signal("BTCUSDT"));

        let outcome = engine.tick("BTCUSDT", 98.0).unwrap();
        assert!(matches!(outcome.position, Some(PositionEvent::Closed(_))));
        assert_eq!(outcome.resolved.len(), 1);
        assert_eq!(outcome.resolved[0].status, SignalStatus::Failed);
        assert_eq!(engine.portfolio_summary().open_count, 0);
        assert!(engine.tick("BTCUSDT", -1.0).is_err());
    }

    #[tokio::test]
    async fn test_refresh_all_returns_signal_per_symbol() {
        let engine = engine(false);
        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let signals = engine.refresh_all(&symbols).await;
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].symbol, "BTCUSDT");
        assert_eq!(signals[1].symbol, "ETHUSDT");
        assert!(signals.iter().all(|s| s.entry_price == 100.0));
    }
}
