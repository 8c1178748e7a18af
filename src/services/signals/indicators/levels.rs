//! Support and resistance levels.

use super::{ensure_len, IndicatorError};
use crate::types::PriceBar;

/// Lowest low and highest high over the trailing `window` bars.
///
/// Returns `(support, resistance)` for the latest bar.
pub fn support_resistance(bars: &[PriceBar], window: usize) -> Result<(f64, f64), IndicatorError> {
    let window = window.max(1);
    ensure_len("support_resistance", bars.len(), window)?;

    let tail = &bars[bars.len() - window..];
    let support = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let resistance = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

    Ok((support, resistance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signals::indicators::test_support::*;

    #[test]
    fn test_levels_use_trailing_window_only() {
        let candles = create_uptrend_candles(40);
        let (support, resistance) = support_resistance(&candles, 20).unwrap();
        // Window starts at bar 20: base = 130, low = 129.
        assert_eq!(support, 129.0);
        // Last bar 39: base = 158.5, high = 160.5.
        assert_eq!(resistance, 160.5);
    }

    #[test]
    fn test_levels_insufficient_data() {
        let candles = create_uptrend_candles(5);
        assert!(support_resistance(&candles, 20).is_err());
    }
}
