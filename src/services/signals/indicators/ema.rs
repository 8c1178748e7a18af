//! Exponential Moving Average (EMA) indicator.

use super::{ema_values, ensure_len, Indicator, IndicatorError};
use crate::types::{closes, PriceBar};

/// EMA (Exponential Moving Average) of closing prices.
///
/// Like SMA but gives more weight to recent prices. Seeded by the simple
/// average of the first `period` closes.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }
}

impl Indicator for Ema {
    fn id(&self) -> &'static str {
        match self.period {
            9 => "ema9",
            20 => "ema20",
            50 => "ema50",
            _ => "ema",
        }
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn calculate(&self, bars: &[PriceBar]) -> Result<Vec<f64>, IndicatorError> {
        ensure_len(self.id(), bars.len(), self.min_periods())?;
        Ok(ema_values(&closes(bars), self.period))
    }
}
