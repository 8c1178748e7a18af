use serde::{Deserialize, Serialize};

/// One interval's open/high/low/close/volume for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    /// Bar open time (Unix ms).
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Ordered sequence of bars, oldest first.
pub type Series = Vec<PriceBar>;

/// Check that timestamps are strictly increasing.
pub fn is_strictly_ordered(bars: &[PriceBar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}

/// Extract closing prices.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Canonical map key for a symbol: trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_check() {
        let a = PriceBar::new(1, 1.0, 1.0, 1.0, 1.0, 1.0);
        let b = PriceBar::new(2, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert!(is_strictly_ordered(&[a, b]));
        assert!(!is_strictly_ordered(&[b, a]));
        assert!(!is_strictly_ordered(&[a, a]));
        assert!(is_strictly_ordered(&[]));
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" btcusdt\n"), "BTCUSDT");
        assert_eq!(normalize_symbol("ETHUSDT"), "ETHUSDT");
    }
}
