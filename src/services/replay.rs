//! Historical replay over a single series.
//!
//! Walks the bars oldest to newest. Each close first ticks open state, then
//! the prefix up to that bar is scored and the signal processed with auto
//! trading on. State lives in an in-memory store and is discarded afterwards.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::config::ScoringConfig;
use crate::services::engine::{Engine, EngineSettings};
use crate::services::signals::{ScoringEngine, SignalHistory};
use crate::services::{SqliteStore, TradingError, TradingService};
use crate::sources::{DataError, DataFuture, MarketData};
use crate::types::{
    PortfolioSummary, PriceBar, Series, SignalStats, TradeRecord, normalize_symbol,
};

/// Serves one fixed series; the price is its last close.
pub struct SeriesSource {
    series: Series,
}

impl SeriesSource {
    pub fn new(series: Series) -> Self {
        Self { series }
    }
}

impl MarketData for SeriesSource {
    fn name(&self) -> &str {
        "series"
    }

    fn get_series<'a>(
        &'a self,
        _symbol: &'a str,
        _timeframe: &'a str,
        limit: usize,
    ) -> DataFuture<'a, Series> {
        let start = self.series.len().saturating_sub(limit);
        let series = self.series[start..].to_vec();
        Box::pin(async move { Ok(series) })
    }

    fn get_price<'a>(&'a self, symbol: &'a str) -> DataFuture<'a, f64> {
        let last = self.series.last().map(|b| b.close);
        Box::pin(async move {
            last.ok_or_else(|| DataError::DataUnavailable(format!("no bars for {}", symbol)))
        })
    }
}

/// Final state of a replay.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub symbol: String,
    pub bars: usize,
    pub signals: usize,
    pub summary: PortfolioSummary,
    pub stats: SignalStats,
    pub trades: Vec<TradeRecord>,
}

/// Replay `series` for `symbol` starting from `capital`.
///
/// `allocation_pct` is the percent of free capital committed per BUY.
pub fn replay(
    symbol: &str,
    series: &[PriceBar],
    scoring: &ScoringConfig,
    capital: f64,
    allocation_pct: f64,
) -> Result<ReplayReport, TradingError> {
    let symbol = normalize_symbol(symbol);
    let sqlite = Arc::new(SqliteStore::new_in_memory()?);
    let trading = Arc::new(TradingService::new(sqlite.clone(), capital));
    let history = SignalHistory::new(sqlite, scoring);
    let settings = EngineSettings {
        auto_trade: true,
        allocation_pct,
        ..EngineSettings::default()
    };
    let engine = Engine::new(
        Arc::new(SeriesSource::new(series.to_vec())),
        scoring.clone(),
        trading.clone(),
        history,
        settings,
    );
    let scorer = ScoringEngine::new(scoring.clone());

    let mut signals = 0;
    for end in 1..=series.len() {
        let bar = series[end - 1];
        engine.tick(&symbol, bar.close)?;

        let signal = scorer.generate(&symbol, &series[..end]);
        if signal.action.is_actionable() {
            signals += 1;
            engine.process_signal(&signal);
        }
    }

    let report = ReplayReport {
        symbol,
        bars: series.len(),
        signals,
        summary: engine.portfolio_summary(),
        stats: engine.signal_stats(),
        trades: trading.history(),
    };
    info!(
        "Replayed {} bars of {}: {} signals, {} trades, {:+.2}%",
        report.bars,
        report.symbol,
        report.signals,
        report.summary.open_count + report.trades.len(),
        report.summary.total_profit_pct
    );
    Ok(report)
}
