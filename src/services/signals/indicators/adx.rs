//! Average Directional Index (ADX) indicator.

use super::{ensure_len, wilders_smooth, Indicator, IndicatorError};
use crate::types::PriceBar;

/// ADX (Average Directional Index) indicator.
///
/// Measures trend strength (not direction):
/// - Below 20: Weak trend / ranging market
/// - 20-40: Trending
/// - Above 40: Strong trend
pub struct Adx {
    period: usize,
}

impl Default for Adx {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Calculate True Range.
    fn true_range(current: &PriceBar, previous: &PriceBar) -> f64 {
        let hl = current.high - current.low;
        let hc = (current.high - previous.close).abs();
        let lc = (current.low - previous.close).abs();
        hl.max(hc).max(lc)
    }
}

impl Indicator for Adx {
    fn id(&self) -> &'static str {
        "adx"
    }

    fn min_periods(&self) -> usize {
        self.period * 2 + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, IndicatorError> {
        ensure_len(self.id(), bars.len(), self.min_periods())?;

        let mut plus_dm = Vec::with_capacity(bars.len() - 1);
        let mut minus_dm = Vec::with_capacity(bars.len() - 1);
        let mut tr = Vec::with_capacity(bars.len() - 1);

        for w in bars.windows(2) {
            let (previous, current) = (&w[0], &w[1]);
            let up_move = current.high - previous.high;
            let down_move = previous.low - current.low;

            plus_dm.push(if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            });
            minus_dm.push(if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            });
            tr.push(Self::true_range(current, previous));
        }

        let smoothed_plus_dm = wilders_smooth(&plus_dm, self.period);
        let smoothed_minus_dm = wilders_smooth(&minus_dm, self.period);
        let smoothed_tr = wilders_smooth(&tr, self.period);

        let dx_values: Vec<f64> = smoothed_tr
            .iter()
            .zip(smoothed_plus_dm.iter().zip(&smoothed_minus_dm))
            .map(|(&atr, (&pdm, &mdm))| {
                if atr == 0.0 {
                    return 0.0;
                }
                let plus_di = pdm / atr * 100.0;
                let minus_di = mdm / atr * 100.0;
                let di_sum = plus_di + minus_di;
                if di_sum > 0.0 {
                    (plus_di - minus_di).abs() / di_sum * 100.0
                } else {
                    0.0
                }
            })
            .collect();

        Ok(wilders_smooth(&dx_values, self.period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signals::indicators::test_support::*;

    #[test]
    fn test_adx_min_periods() {
        assert_eq!(Adx::default().min_periods(), 29);
    }

    #[test]
    fn test_adx_insufficient_data() {
        let candles = create_uptrend_candles(20);
        assert!(Adx::default().calculate(&candles).is_err());
    }

    #[test]
    fn test_adx_strong_trend() {
        let candles = create_uptrend_candles(50);
        let values = Adx::default().calculate(&candles).unwrap();
        assert_eq!(values.len(), 50 - 2 * 14 + 1);
        let adx = *values.last().unwrap();
        assert!(adx > 25.0, "steady uptrend should read as trending, got {}", adx);
    }

    #[test]
    fn test_adx_range() {
        let candles = create_choppy_candles(60, 1000.0);
        let values = Adx::default().calculate(&candles).unwrap();
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
    }
}
