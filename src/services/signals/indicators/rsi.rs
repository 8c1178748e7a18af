//! Relative Strength Index (RSI) indicator.

use super::{ensure_len, Indicator, IndicatorError};
use crate::types::PriceBar;

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum by comparing the magnitude of recent gains to recent losses,
/// each averaged with a simple rolling mean over the last `period` changes.
/// Values range from 0-100:
/// - Below 30: Oversold (potential buy signal)
/// - Above 70: Overbought (potential sell signal)
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn id(&self) -> &'static str {
        "rsi"
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    /// One value per bar from index `period` on.
    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, IndicatorError> {
        ensure_len(self.id(), bars.len(), self.min_periods())?;

        let (gains, losses): (Vec<f64>, Vec<f64>) = bars
            .windows(2)
            .map(|w| {
                let change = w[1].close - w[0].close;
                if change > 0.0 {
                    (change, 0.0)
                } else {
                    (0.0, -change)
                }
            })
            .unzip();

        // Simple rolling means over the trailing `period` changes. Each window is
        // summed afresh so a loss leaving the window drops out exactly.
        let period = self.period as f64;
        let values = (self.period..=gains.len())
            .map(|end| {
                let start = end - self.period;
                let avg_gain = gains[start..end].iter().sum::<f64>() / period;
                let avg_loss = losses[start..end].iter().sum::<f64>() / period;
                Self::from_averages(avg_gain, avg_loss)
            })
            .collect();

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::signals::indicators::test_support::*;

    #[test]
    fn test_rsi_min_periods() {
        assert_eq!(Rsi::default().min_periods(), 15);
        assert_eq!(Rsi::new(7).min_periods(), 8);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let candles = create_uptrend_candles(10);
        let result = Rsi::default().calculate(&candles);
        assert!(matches!(
            result,
            Err(IndicatorError::InsufficientData { required: 15, available: 10, .. })
        ));
    }

    #[test]
    fn test_rsi_one_value_per_warm_bar() {
        let candles = create_uptrend_candles(30);
        let values = Rsi::default().calculate(&candles).unwrap();
        assert_eq!(values.len(), 30 - 14);
    }

    #[test]
    fn test_rsi_monotonic_rise_is_100() {
        let candles = create_uptrend_candles(50);
        let values = Rsi::default().calculate(&candles).unwrap();
        assert_eq!(*values.last().unwrap(), 100.0);
    }

    #[test]
    fn test_rsi_uses_rolling_mean() {
        let candles: Vec<PriceBar> = [10.0, 11.0, 10.0, 12.0]
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(i as i64, c, c, c, c, 1.0))
            .collect();
        let values = Rsi::new(2).calculate(&candles).unwrap();
        assert_eq!(values.len(), 2);
        // (+1, -1): equal means
        assert!((values[0] - 50.0).abs() < 1e-9);
        // (-1, +2): gain mean 1.0, loss mean 0.5, rs 2
        assert!((values[1] - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_downtrend_low_value() {
        let candles = create_downtrend_candles(50);
        let values = Rsi::default().calculate(&candles).unwrap();
        let rsi = *values.last().unwrap();
        assert!(rsi < 50.0, "RSI in downtrend should be < 50, got {}", rsi);
    }

    #[test]
    fn test_rsi_value_range() {
        let candles = create_choppy_candles(60, 1000.0);
        let values = Rsi::default().calculate(&candles).unwrap();
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
    }
}
