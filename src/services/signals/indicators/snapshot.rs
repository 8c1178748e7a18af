//! Full indicator snapshot for one evaluation.

use super::{
    ensure_len, last, market_sentiment, momentum_score, support_resistance, volume_profile, Adx,
    Ema, Indicator, IndicatorError, Macd, Rsi, Stochastic,
};
use crate::config::ScoringConfig;
use crate::types::{IndicatorSnapshot, PriceBar};

/// Bars needed before a snapshot can be computed (EMA50 is the longest window).
pub const SNAPSHOT_MIN_BARS: usize = 50;

/// Window used for support/resistance.
const LEVELS_WINDOW: usize = 20;

/// Compute every indicator the scoring engine consumes.
pub fn compute_snapshot(
    bars: &[PriceBar],
    config: &ScoringConfig,
) -> Result<IndicatorSnapshot, IndicatorError> {
    let rsi = Rsi::new(config.rsi_period);
    let required = SNAPSHOT_MIN_BARS
        .max(rsi.min_periods())
        .max(config.volume_window);
    ensure_len("snapshot", bars.len(), required)?;

    let macd_values = Macd::default().calculate(bars)?;
    let macd_diff = last("macd_diff", &macd_values)?;
    let macd_diff_prev = if macd_values.len() >= 2 {
        macd_values[macd_values.len() - 2]
    } else {
        macd_diff
    };

    let (support, resistance) = support_resistance(bars, LEVELS_WINDOW)?;

    let latest = bars[bars.len() - 1];
    let volume_window = config.volume_window.max(1);
    let volume_mean = bars[bars.len() - volume_window..]
        .iter()
        .map(|b| b.volume)
        .sum::<f64>()
        / volume_window as f64;

    Ok(IndicatorSnapshot {
        rsi: last(rsi.id(), &rsi.calculate(bars)?)?,
        macd_diff,
        macd_diff_prev,
        stochastic: last("stochastic", &Stochastic::default().calculate(bars)?)?,
        adx: last("adx", &Adx::default().calculate(bars)?)?,
        ema_fast: last("ema9", &Ema::new(9).calculate(bars)?)?,
        ema_mid: last("ema20", &Ema::new(20).calculate(bars)?)?,
        ema_slow: last("ema50", &Ema::new(50).calculate(bars)?)?,
        support,
        resistance,
        momentum_score: momentum_score(bars)?,
        sentiment_score: market_sentiment(bars)?,
        volume_ratio: volume_profile(bars)?,
        close: latest.close,
        mean_close: bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64,
        volume: latest.volume,
        volume_mean,
    })
}
