//! Stochastic Oscillator indicator.

use super::{ensure_len, Indicator, IndicatorError};
use crate::types::PriceBar;

/// Stochastic Oscillator (%K).
///
/// Compares closing price to price range over a period:
/// %K = (Current Close - Lowest Low) / (Highest High - Lowest Low) * 100
///
/// A flat window (high == low) yields 50.
pub struct Stochastic {
    k_period: usize,
}

impl Default for Stochastic {
    fn default() -> Self {
        Self { k_period: 14 }
    }
}

impl Stochastic {
    pub fn new(k_period: usize) -> Self {
        Self {
            k_period: k_period.max(1),
        }
    }
}

impl Indicator for Stochastic {
    fn id(&self) -> &'static str {
        "stochastic"
    }

    /// One extra bar so the latest %K can be compared with the previous one.
    fn min_periods(&self) -> usize {
        self.k_period + 1
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, IndicatorError> {
        ensure_len(self.id(), bars.len(), self.min_periods())?;

        Ok(bars
            .windows(self.k_period)
            .map(|window| {
                let lowest_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
                let highest_high = window
                    .iter()
                    .map(|c| c.high)
                    .fold(f64::NEG_INFINITY, f64::max);
                let close = window[window.len() - 1].close;

                if highest_high > lowest_low {
                    ((close - lowest_low) / (highest_high - lowest_low) * 100.0).clamp(0.0, 100.0)
                } else {
                    50.0
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signals::indicators::test_support::*;

    #[test]
    fn test_stochastic_min_periods() {
        assert_eq!(Stochastic::default().min_periods(), 15);
    }

    #[test]
    fn test_stochastic_insufficient_data() {
        let candles = create_uptrend_candles(10);
        assert!(Stochastic::default().calculate(&candles).is_err());
    }

    #[test]
    fn test_stochastic_uptrend_high_k() {
        let candles = create_uptrend_candles(30);
        let values = Stochastic::default().calculate(&candles).unwrap();
        assert_eq!(values.len(), 17);
        let k = *values.last().unwrap();
        assert!(k > 50.0, "Stochastic %K in uptrend should be > 50, got {}", k);
    }

    #[test]
    fn test_stochastic_value_range() {
        let candles = create_downtrend_candles(30);
        let values = Stochastic::default().calculate(&candles).unwrap();
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
    }
}
