//! Composite indicators built from the primitive ones.

use super::{ensure_len, last, Adx, Ema, Indicator, IndicatorError, Macd, Rsi, Stochastic};
use crate::types::PriceBar;

/// Bars in the "recent" volume window.
const RECENT_VOLUME_BARS: usize = 5;

/// Four binary momentum tests averaged into {0, 0.25, 0.5, 0.75, 1}:
/// MACD-diff > 0, 40 < RSI < 60, stochastic %K rising, ADX > 25.
pub fn momentum_score(bars: &[PriceBar]) -> Result<f64, IndicatorError> {
    let macd = Macd::default();
    let rsi = Rsi::default();
    let stochastic = Stochastic::default();
    let adx = Adx::default();

    let required = [
        macd.min_periods(),
        rsi.min_periods(),
        stochastic.min_periods(),
        adx.min_periods(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0);
    ensure_len("momentum_score", bars.len(), required)?;

    let macd_diff = last(macd.id(), &macd.calculate(bars)?)?;
    let rsi_value = last(rsi.id(), &rsi.calculate(bars)?)?;
    let k = stochastic.calculate(bars)?;
    let adx_value = last(adx.id(), &adx.calculate(bars)?)?;

    let stochastic_rising = k.len() >= 2 && k[k.len() - 1] > k[k.len() - 2];

    let tests = [
        macd_diff > 0.0,
        rsi_value > 40.0 && rsi_value < 60.0,
        stochastic_rising,
        adx_value > 25.0,
    ];

    Ok(tests.iter().filter(|t| **t).count() as f64 / tests.len() as f64)
}

/// Three binary EMA-ordering tests averaged into {0, 1/3, 2/3, 1}:
/// EMA9 > EMA20, EMA20 > EMA50, close > EMA20.
pub fn market_sentiment(bars: &[PriceBar]) -> Result<f64, IndicatorError> {
    ensure_len("market_sentiment", bars.len(), 50)?;

    let ema9 = last("ema9", &Ema::new(9).calculate(bars)?)?;
    let ema20 = last("ema20", &Ema::new(20).calculate(bars)?)?;
    let ema50 = last("ema50", &Ema::new(50).calculate(bars)?)?;
    let close = bars[bars.len() - 1].close;

    let tests = [ema9 > ema20, ema20 > ema50, close > ema20];

    Ok(tests.iter().filter(|t| **t).count() as f64 / tests.len() as f64)
}

/// Mean volume of the last five bars over mean volume of the whole slice.
///
/// Above 1 means activity is picking up. A slice with zero total volume
/// yields 0.
pub fn volume_profile(bars: &[PriceBar]) -> Result<f64, IndicatorError> {
    ensure_len("volume_profile", bars.len(), RECENT_VOLUME_BARS)?;

    let overall = bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;
    if overall <= 0.0 {
        return Ok(0.0);
    }

    let recent = bars[bars.len() - RECENT_VOLUME_BARS..]
        .iter()
        .map(|b| b.volume)
        .sum::<f64>()
        / RECENT_VOLUME_BARS as f64;

    Ok(recent / overall)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signals::indicators::test_support::*;

    #[test]
    fn test_sentiment_uptrend_is_fully_bullish() {
        let candles = create_uptrend_candles(80);
        assert_eq!(market_sentiment(&candles).unwrap(), 1.0);
    }

    #[test]
    fn test_sentiment_downtrend_is_bearish() {
        let candles = create_downtrend_candles(80);
        assert_eq!(market_sentiment(&candles).unwrap(), 0.0);
    }

    #[test]
    fn test_sentiment_needs_fifty_bars() {
        let candles = create_uptrend_candles(49);
        assert!(market_sentiment(&candles).is_err());
    }

    #[test]
    fn test_momentum_score_is_quarter_step() {
        for candles in [
            create_uptrend_candles(80),
            create_downtrend_candles(80),
            create_choppy_candles(80, 500.0),
        ] {
            let score = momentum_score(&candles).unwrap();
            assert!((0.0..=1.0).contains(&score));
            assert_eq!((score * 4.0).fract(), 0.0);
        }
    }

    #[test]
    fn test_momentum_score_needs_macd_window() {
        let candles = create_uptrend_candles(30);
        assert!(momentum_score(&candles).is_err());
    }

    #[test]
    fn test_volume_profile_flat_is_one() {
        let candles = create_choppy_candles(30, 1000.0);
        assert!((volume_profile(&candles).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_volume_profile_spike() {
        let mut candles = create_choppy_candles(20, 100.0);
        for bar in candles.iter_mut().rev().take(5) {
            bar.volume = 400.0;
        }
        // recent 400 / overall (15 * 100 + 5 * 400) / 20 = 175
        let ratio = volume_profile(&candles).unwrap();
        assert!((ratio - 400.0 / 175.0).abs() < 1e-12);
    }

    #[test]
    fn test_volume_profile_zero_volume() {
        let candles = create_choppy_candles(10, 0.0);
        assert_eq!(volume_profile(&candles).unwrap(), 0.0);
    }
}
