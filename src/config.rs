use std::env;
use std::time::Duration;

use crate::types::normalize_symbol;

/// Constants used by the scoring engine and the signal tracker.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// RSI look-back period.
    pub rsi_period: usize,
    /// Lower bound of the BUY zone (inclusive).
    pub rsi_buy_low: f64,
    /// Upper bound of the BUY zone (inclusive).
    pub rsi_buy_high: f64,
    /// Upper bound of the neutral-bullish RSI zone (inclusive).
    pub rsi_neutral_high: f64,
    /// RSI at or above which a SELL is emitted.
    pub rsi_overbought: f64,
    /// Bars used for the volume baseline of the composite score.
    pub volume_window: usize,
    /// Stop-loss as a multiple of entry price for BUY signals.
    pub stop_loss_mult: f64,
    /// First target as a multiple of entry price for BUY signals.
    pub target_1_mult: f64,
    /// Second target as a multiple of entry price for BUY signals.
    pub target_2_mult: f64,
    /// Stop distance (fraction of price) used when tracking a SELL signal.
    pub sell_stop_pct: f64,
    /// Target distance (fraction of price) used when tracking a SELL signal.
    pub sell_target_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_buy_low: 30.0,
            rsi_buy_high: 40.0,
            rsi_neutral_high: 60.0,
            rsi_overbought: 70.0,
            volume_window: 20,
            stop_loss_mult: 0.99,
            target_1_mult: 1.02,
            target_2_mult: 1.03,
            sell_stop_pct: 0.01,
            sell_target_pct: 0.02,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Symbols re-evaluated by the poller.
    pub symbols: Vec<String>,
    /// Candle interval requested from the market-data source (e.g. "1h").
    pub timeframe: String,
    /// Number of candles fetched per evaluation.
    pub candle_limit: usize,
    /// Interval between poller ticks (seconds).
    pub poll_interval_secs: u64,
    /// Market-data cache TTL (seconds).
    pub cache_ttl_secs: u64,
    /// Per-symbol fetch timeout (seconds).
    pub fetch_timeout_secs: u64,
    /// Starting capital of the portfolio.
    pub initial_capital: f64,
    /// Percent of free capital committed to an auto-opened position.
    pub trade_allocation_pct: f64,
    /// Open positions automatically on BUY signals.
    pub auto_trade: bool,
    /// SQLite database path.
    pub sqlite_path: String,
    /// Binance REST base URL.
    pub binance_api_url: String,
    /// Binance API key (optional, public endpoints work without).
    pub binance_api_key: Option<String>,
    /// Scoring constants.
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            symbols: vec![
                "BTCUSDT".to_string(),
                "ETHUSDT".to_string(),
                "SOLUSDT".to_string(),
            ],
            timeframe: "1h".to_string(),
            candle_limit: 100,
            poll_interval_secs: 60,
            cache_ttl_secs: 10,
            fetch_timeout_secs: 10,
            initial_capital: 10_000.0,
            trade_allocation_pct: 10.0,
            auto_trade: false,
            sqlite_path: "data/cryptoscope.db".to_string(),
            binance_api_url: "https://api.binance.com/api/v3".to_string(),
            binance_api_key: None,
            scoring: ScoringConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Format: "BTCUSDT,ETHUSDT"
        let symbols = env::var("SYMBOLS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(normalize_symbol)
                    .filter(|sym| !sym.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.symbols);

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            symbols,
            timeframe: env::var("TIMEFRAME").unwrap_or(defaults.timeframe),
            candle_limit: env::var("CANDLE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.candle_limit),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.poll_interval_secs),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_ttl_secs),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_timeout_secs),
            initial_capital: env::var("INITIAL_CAPITAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.initial_capital),
            trade_allocation_pct: env::var("TRADE_ALLOCATION_PCT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.trade_allocation_pct),
            auto_trade: env::var("AUTO_TRADE")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.auto_trade),
            sqlite_path: env::var("SQLITE_PATH").unwrap_or(defaults.sqlite_path),
            binance_api_url: env::var("BINANCE_API_URL").unwrap_or(defaults.binance_api_url),
            binance_api_key: env::var("BINANCE_API_KEY").ok(),
            scoring: ScoringConfig::default(),
        }
    }

    /// Poller interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Market-data cache TTL as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Per-symbol fetch timeout as a `Duration`.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
