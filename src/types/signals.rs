use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Discrete action classified by the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    Buy,
    Sell,
    None,
}

impl SignalAction {
    /// Whether this action should be tracked / acted upon.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, SignalAction::None)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::None => "NONE",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SELL" => Some(Self::Sell),
            "NONE" => Some(Self::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Indicator values computed for one evaluation. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub macd_diff: f64,
    /// MACD-diff of the previous bar.
    pub macd_diff_prev: f64,
    /// Stochastic %K.
    pub stochastic: f64,
    pub adx: f64,
    /// EMA(9).
    pub ema_fast: f64,
    /// EMA(20).
    pub ema_mid: f64,
    /// EMA(50).
    pub ema_slow: f64,
    pub support: f64,
    pub resistance: f64,
    /// 0..=1 in quarter steps.
    pub momentum_score: f64,
    /// 0..=1 in third steps.
    pub sentiment_score: f64,
    /// Recent (5-bar) mean volume over full-window mean volume.
    pub volume_ratio: f64,
    /// Latest close.
    pub close: f64,
    /// Mean close over the whole series.
    pub mean_close: f64,
    /// Latest bar volume.
    pub volume: f64,
    /// Mean volume over the trailing volume window.
    pub volume_mean: f64,
}

impl IndicatorSnapshot {
    pub fn macd_rising(&self) -> bool {
        self.macd_diff > self.macd_diff_prev
    }

    pub fn macd_falling(&self) -> bool {
        self.macd_diff < self.macd_diff_prev
    }
}

/// Output of the scoring engine for one symbol. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub action: SignalAction,
    /// 0..=1, zero for `None`.
    pub strength: f64,
    /// Composite opportunity score, 0..=1.
    pub score: f64,
    /// Price the signal was evaluated at.
    pub entry_price: f64,
    /// Only populated for BUY signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_2: Option<f64>,
    /// Sub-conditions that fired, in trend, RSI, volume, risk-reward order.
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<IndicatorSnapshot>,
    /// Unix ms.
    pub created_at: i64,
}

impl Signal {
    /// A non-actionable signal, used when indicators cannot be computed yet.
    pub fn none(symbol: &str, price: f64, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: SignalAction::None,
            strength: 0.0,
            score: 0.0,
            entry_price: price,
            stop_loss: None,
            target_1: None,
            target_2: None,
            reasons: vec![reason.into()],
            indicators: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Resolution state of a tracked signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Pending,
    Successful,
    Failed,
}

impl SignalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SignalStatus::Pending)
    }
}

/// A tracked signal awaiting (or past) resolution against a later price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    pub id: String,
    pub symbol: String,
    /// BUY or SELL; never `None`.
    pub signal_type: SignalAction,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    /// Unix ms.
    pub timestamp: i64,
    pub status: SignalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<i64>,
}

impl SignalRecord {
    /// Create a pending record. Returns `None` for non-actionable types.
    pub fn new(
        symbol: String,
        signal_type: SignalAction,
        entry_price: f64,
        target_price: f64,
        stop_loss: f64,
    ) -> Option<Self> {
        if !signal_type.is_actionable() {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol,
            signal_type,
            entry_price,
            target_price,
            stop_loss,
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: SignalStatus::Pending,
            exit_price: None,
            result_pct: None,
            resolved_at: None,
        })
    }

    /// Outcome a price observation would produce, if any.
    pub fn outcome_at(&self, price: f64) -> Option<SignalStatus> {
        if self.status.is_terminal() {
            return None;
        }
        match self.signal_type {
            SignalAction::Buy => {
                if price <= self.stop_loss {
                    Some(SignalStatus::Failed)
                } else if price >= self.target_price {
                    Some(SignalStatus::Successful)
                } else {
                    None
                }
            }
            SignalAction::Sell => {
                if price >= self.stop_loss {
                    Some(SignalStatus::Failed)
                } else if price <= self.target_price {
                    Some(SignalStatus::Successful)
                } else {
                    None
                }
            }
            SignalAction::None => None,
        }
    }

    /// Resolve against `price`. Returns true if the record transitioned.
    pub fn resolve(&mut self, price: f64) -> bool {
        let Some(status) = self.outcome_at(price) else {
            return false;
        };
        self.status = status;
        self.exit_price = Some(price);
        self.result_pct = Some(pnl_pct(self.signal_type, self.entry_price, price));
        self.resolved_at = Some(chrono::Utc::now().timestamp_millis());
        true
    }
}

/// Long/short-aware percentage return.
pub fn pnl_pct(side: SignalAction, entry_price: f64, exit_price: f64) -> f64 {
    if entry_price == 0.0 {
        return 0.0;
    }
    match side {
        SignalAction::Sell => (entry_price - exit_price) / entry_price * 100.0,
        _ => (exit_price - entry_price) / entry_price * 100.0,
    }
}

/// Aggregate counters of the signal tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub pending: u64,
    /// Mean `result_pct` over resolved records.
    pub average_profit: f64,
    /// Percentage of successful records per signal type ("BUY", "SELL").
    pub success_rate_by_type: HashMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_type_is_not_tracked() {
        assert!(SignalRecord::new("BTC".into(), SignalAction::None, 1.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn test_buy_record_resolution() {
        let mut record =
            SignalRecord::new("BTC".into(), SignalAction::Buy, 100.0, 102.0, 99.0).unwrap();
        assert!(!record.resolve(100.5));
        assert!(record.resolve(102.0));
        assert_eq!(record.status, SignalStatus::Successful);
        assert!((record.result_pct.unwrap() - 2.0).abs() < 1e-9);
        // Terminal: a later stop-out does nothing.
        assert!(!record.resolve(90.0));
        assert_eq!(record.status, SignalStatus::Successful);
    }

    #[test]
    fn test_sell_record_resolution() {
        let mut record =
            SignalRecord::new("ETH".into(), SignalAction::Sell, 100.0, 98.0, 101.0).unwrap();
        assert!(record.resolve(101.5));
        assert_eq!(record.status, SignalStatus::Failed);
        assert!((record.result_pct.unwrap() + 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_action_serializes_uppercase() {
        let json = serde_json::to_string(&SignalAction::Buy).unwrap();
        assert_eq!(json, "\"BUY\"");
        assert_eq!(SignalAction::from_str("sell"), Some(SignalAction::Sell));
    }
}
