//! Technical indicator implementations.
//!
//! Every indicator is a pure function of an ordered bar slice. Outputs are
//! aligned to the tail of the input: the last value belongs to the latest bar.
//! Short input fails with [`IndicatorError::InsufficientData`], which callers
//! treat as "not computable yet".

pub mod adx;
pub mod composite;
pub mod ema;
pub mod levels;
pub mod macd;
pub mod rsi;
pub mod snapshot;
pub mod stochastic;

pub use adx::Adx;
pub use composite::{market_sentiment, momentum_score, volume_profile};
pub use ema::Ema;
pub use levels::support_resistance;
pub use macd::Macd;
pub use rsi::Rsi;
pub use snapshot::compute_snapshot;
pub use stochastic::Stochastic;

use crate::types::PriceBar;
use thiserror::Error;

/// Indicator computation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("{indicator} needs {required} bars, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },
}

/// A technical indicator producing one value per bar once warmed up.
pub trait Indicator: Send + Sync {
    /// Unique identifier for this indicator.
    fn id(&self) -> &'static str;

    /// Minimum number of bars required for calculation.
    fn min_periods(&self) -> usize;

    /// Calculate the indicator series, tail-aligned with `bars`.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, IndicatorError>;
}

/// Fail with `InsufficientData` when `bars` is shorter than `required`.
pub(crate) fn ensure_len(
    indicator: &'static str,
    available: usize,
    required: usize,
) -> Result<(), IndicatorError> {
    if available < required {
        return Err(IndicatorError::InsufficientData {
            indicator,
            required,
            available,
        });
    }
    Ok(())
}

/// EMA of a value series seeded by the simple average of the first `period`
/// values. Returns `len - period + 1` values, or nothing if too short.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema = Vec::with_capacity(values.len() - period + 1);

    // First EMA is SMA
    let mut current = values.iter().take(period).sum::<f64>() / period as f64;
    ema.push(current);

    for value in &values[period..] {
        current = (value - current) * multiplier + current;
        ema.push(current);
    }

    ema
}

/// Wilder's smoothing: SMA seed, then `(prev * (n - 1) + x) / n`.
pub(crate) fn wilders_smooth(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut current = values.iter().take(period).sum::<f64>() / period as f64;
    result.push(current);

    for value in &values[period..] {
        current = (current * (period - 1) as f64 + value) / period as f64;
        result.push(current);
    }

    result
}

/// Last value of an indicator series.
pub(crate) fn last(indicator: &'static str, values: &[f64]) -> Result<f64, IndicatorError> {
    values
        .last()
        .copied()
        .ok_or(IndicatorError::InsufficientData {
            indicator,
            required: 1,
            available: 0,
        })
}

/// RSI series with the given period.
pub fn rsi(bars: &[PriceBar], period: usize) -> Result<Vec<f64>, IndicatorError> {
    Rsi::new(period).calculate(bars)
}

/// EMA series of closes with the given period.
pub fn ema(bars: &[PriceBar], period: usize) -> Result<Vec<f64>, IndicatorError> {
    Ema::new(period).calculate(bars)
}

/// MACD line minus signal line.
pub fn macd_diff(
    bars: &[PriceBar],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<Vec<f64>, IndicatorError> {
    Macd::new(fast, slow, signal).calculate(bars)
}

/// Stochastic %K series.
pub fn stochastic(bars: &[PriceBar], period: usize) -> Result<Vec<f64>, IndicatorError> {
    Stochastic::new(period).calculate(bars)
}

/// ADX series.
pub fn adx(bars: &[PriceBar], period: usize) -> Result<Vec<f64>, IndicatorError> {
    Adx::new(period).calculate(bars)
}
