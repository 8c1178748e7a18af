//! Scoring engine: turns an indicator snapshot into a composite score and a
//! discrete BUY/SELL/NONE signal with human-readable reasons.

use tracing::debug;

use super::indicators::compute_snapshot;
use crate::config::ScoringConfig;
use crate::types::{is_strictly_ordered, IndicatorSnapshot, PriceBar, Signal, SignalAction};

/// Composite score broken down by component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub trend: f64,
    pub rsi: f64,
    pub volume: f64,
}

impl ScoreBreakdown {
    /// Sum of components, capped at 1.
    pub fn total(&self) -> f64 {
        (self.trend + self.rsi + self.volume).clamp(0.0, 1.0)
    }
}

/// Stateless signal generator.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Generate a signal from a bar series, priced at the latest close.
    ///
    /// Never fails: a series that is empty, unordered or too short yields a
    /// `None` signal explaining why.
    pub fn generate(&self, symbol: &str, bars: &[PriceBar]) -> Signal {
        let Some(latest) = bars.last() else {
            return Signal::none(symbol, 0.0, "No price data");
        };
        self.generate_at(symbol, bars, latest.close)
    }

    /// Generate a signal from a bar series, priced at `price`.
    pub fn generate_at(&self, symbol: &str, bars: &[PriceBar], price: f64) -> Signal {
        if !is_strictly_ordered(bars) {
            return Signal::none(symbol, price, "Price series is not in time order");
        }

        match compute_snapshot(bars, &self.config) {
            Ok(snapshot) => self.score(symbol, &snapshot, price),
            Err(e) => {
                debug!("{}: score not yet computable: {}", symbol, e);
                Signal::none(symbol, price, format!("Insufficient data: {}", e))
            }
        }
    }

    /// Composite score components for a snapshot at `price`.
    pub fn breakdown(&self, snapshot: &IndicatorSnapshot, price: f64) -> ScoreBreakdown {
        let trend = if price > snapshot.ema_fast && snapshot.ema_fast > snapshot.ema_mid {
            0.4
        } else if price > snapshot.ema_mid {
            0.2
        } else {
            0.0
        };

        let rsi = if self.in_buy_zone(snapshot.rsi) {
            0.3
        } else if snapshot.rsi > self.config.rsi_buy_high
            && snapshot.rsi <= self.config.rsi_neutral_high
        {
            0.2
        } else {
            0.0
        };

        let volume = if snapshot.volume > snapshot.volume_mean * 1.5 {
            0.3
        } else if snapshot.volume > snapshot.volume_mean {
            0.2
        } else {
            0.0
        };

        ScoreBreakdown { trend, rsi, volume }
    }

    /// Classify a snapshot into a signal.
    pub fn score(&self, symbol: &str, snapshot: &IndicatorSnapshot, price: f64) -> Signal {
        let cfg = &self.config;
        let breakdown = self.breakdown(snapshot, price);

        let buy = self.in_buy_zone(snapshot.rsi)
            && snapshot.macd_rising()
            && snapshot.volume_ratio > 1.0;
        let overbought = snapshot.rsi >= cfg.rsi_overbought;
        let macd_exhaustion = snapshot.macd_falling() && price >= snapshot.mean_close;

        let (action, strength) = if buy {
            let band = (cfg.rsi_buy_high - cfg.rsi_buy_low).max(f64::EPSILON);
            let depth = (cfg.rsi_buy_high - snapshot.rsi) / band;
            (SignalAction::Buy, depth * 0.5 + snapshot.volume_ratio * 0.5)
        } else if overbought {
            let excess = (snapshot.rsi - cfg.rsi_overbought) / 10.0;
            (SignalAction::Sell, excess * 0.5 + snapshot.volume_ratio * 0.5)
        } else if macd_exhaustion {
            (SignalAction::Sell, snapshot.volume_ratio * 0.5)
        } else {
            (SignalAction::None, 0.0)
        };

        let (stop_loss, target_1, target_2) = if action == SignalAction::Buy {
            (
                Some(price * cfg.stop_loss_mult),
                Some(price * cfg.target_1_mult),
                Some(price * cfg.target_2_mult),
            )
        } else {
            (None, None, None)
        };

        let reasons = self.reasons(snapshot, price, &breakdown, action, overbought, stop_loss, target_1);

        Signal {
            symbol: symbol.to_string(),
            action,
            strength: strength.clamp(0.0, 1.0),
            score: breakdown.total(),
            entry_price: price,
            stop_loss,
            target_1,
            target_2,
            reasons,
            indicators: Some(snapshot.clone()),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn in_buy_zone(&self, rsi: f64) -> bool {
        rsi >= self.config.rsi_buy_low && rsi <= self.config.rsi_buy_high
    }

    /// Reasons in trend, RSI, volume, risk-reward order.
    #[allow(clippy::too_many_arguments)]
    fn reasons(
        &self,
        snapshot: &IndicatorSnapshot,
        price: f64,
        breakdown: &ScoreBreakdown,
        action: SignalAction,
        overbought: bool,
        stop_loss: Option<f64>,
        target_1: Option<f64>,
    ) -> Vec<String> {
        let cfg = &self.config;
        let mut reasons = Vec::new();

        // Trend
        if breakdown.trend >= 0.4 {
            reasons.push("Strong uptrend: price > EMA9 > EMA20".to_string());
        } else if breakdown.trend > 0.0 {
            reasons.push("Price above EMA20".to_string());
        }
        match action {
            SignalAction::Buy => reasons.push("MACD histogram rising".to_string()),
            SignalAction::Sell if !overbought => {
                reasons.push("MACD histogram falling with price above series mean".to_string())
            }
            _ => {}
        }

        // RSI
        if breakdown.rsi >= 0.3 {
            reasons.push(format!(
                "RSI {:.1} in buy zone ({:.0}-{:.0})",
                snapshot.rsi, cfg.rsi_buy_low, cfg.rsi_buy_high
            ));
        } else if breakdown.rsi > 0.0 {
            reasons.push(format!("RSI {:.1} neutral-bullish", snapshot.rsi));
        } else if overbought {
            reasons.push(format!(
                "RSI {:.1} overbought (>= {:.0})",
                snapshot.rsi, cfg.rsi_overbought
            ));
        }

        // Volume
        if breakdown.volume >= 0.3 {
            reasons.push(format!(
                "Volume spike: {:.2}x {}-bar average",
                ratio(snapshot.volume, snapshot.volume_mean),
                cfg.volume_window
            ));
        } else if breakdown.volume > 0.0 {
            reasons.push(format!("Volume above {}-bar average", cfg.volume_window));
        }
        if action == SignalAction::Buy {
            reasons.push(format!(
                "Recent volume {:.2}x window average",
                snapshot.volume_ratio
            ));
        }

        // Risk-reward
        if let (Some(stop), Some(target)) = (stop_loss, target_1) {
            let risk = price - stop;
            let reward = target - price;
            if risk > 0.0 {
                reasons.push(format!(
                    "Risk/reward 1:{:.1} (stop {:.4}, target {:.4})",
                    reward / risk,
                    stop,
                    target
                ));
            }
        }

        reasons
    }
}

fn ratio(value: f64, base: f64) -> f64 {
    if base > 0.0 {
        value / base
    } else {
        0.0
    }
}
