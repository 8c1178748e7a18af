//! MACD (Moving Average Convergence Divergence) indicator.

use super::{ema_values, ensure_len, Indicator, IndicatorError};
use crate::types::{closes, PriceBar};

/// MACD-diff (histogram).
///
/// - MACD Line = EMA(fast) - EMA(slow)
/// - Signal Line = EMA(signal) of MACD Line
/// - Output = MACD Line - Signal Line
///
/// Needs enough bars for two output values so that the direction of the
/// histogram can always be read.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period: fast_period.max(1),
            slow_period: slow_period.max(1),
            signal_period: signal_period.max(1),
        }
    }
}

impl Indicator for Macd {
    fn id(&self) -> &'static str {
        "macd_diff"
    }

    fn min_periods(&self) -> usize {
        self.fast_period.max(self.slow_period) + self.signal_period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, IndicatorError> {
        ensure_len(self.id(), bars.len(), self.min_periods())?;

        let closes = closes(bars);
        let fast_ema = ema_values(&closes, self.fast_period);
        let slow_ema = ema_values(&closes, self.slow_period);

        // Both series end on the latest bar; align on the shorter one.
        let len = fast_ema.len().min(slow_ema.len());
        let macd_line: Vec<f64> = fast_ema[fast_ema.len() - len..]
            .iter()
            .zip(&slow_ema[slow_ema.len() - len..])
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = ema_values(&macd_line, self.signal_period);
        let offset = macd_line.len() - signal_line.len();

        Ok(macd_line[offset..]
            .iter()
            .zip(&signal_line)
            .map(|(m, s)| m - s)
            .collect())
    }
}
