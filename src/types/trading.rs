use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::services::TradingError;
use crate::types::{pnl_pct, SignalAction};

// =============================================================================
// Position
// =============================================================================

/// Lifecycle state of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Open,
    PartiallyClosed,
    Closed,
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "open"),
            PositionStatus::PartiallyClosed => write!(f, "partially_closed"),
            PositionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Why (part of) a position was exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "Stop Loss")]
    StopLoss,
    #[serde(rename = "Target 1")]
    Target1,
    #[serde(rename = "Target 2")]
    Target2,
    #[serde(rename = "Manual")]
    Manual,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "Stop Loss"),
            ExitReason::Target1 => write!(f, "Target 1"),
            ExitReason::Target2 => write!(f, "Target 2"),
            ExitReason::Manual => write!(f, "Manual"),
        }
    }
}

/// One exit (partial or final) on a position's trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialExit {
    /// Unix ms.
    pub date: i64,
    pub price: f64,
    pub amount: f64,
    /// Return on the exited fraction only.
    pub pnl_pct: f64,
    pub reason: ExitReason,
}

/// Result of applying a price update to a position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "exit", rename_all = "snake_case")]
pub enum PositionEvent {
    /// No transition; only the mark price was refreshed.
    Unchanged,
    /// Part of the position was exited and the remainder stays open.
    PartialExit(PartialExit),
    /// The remaining amount was exited; the position is closed.
    Closed(PartialExit),
}

/// A long position managed through open -> partially_closed -> closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    /// Unique among open positions.
    pub symbol: String,
    /// Remaining amount held.
    pub amount: f64,
    /// Amount at entry.
    pub initial_amount: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
    /// Unix ms.
    pub entry_date: i64,
    pub status: PositionStatus,
    pub target1_hit: bool,
    #[serde(default)]
    pub partial_exits: Vec<PartialExit>,
    /// Realized return weighted by the exited share of the initial amount.
    pub realized_pnl_pct: f64,
    /// Last price a transition was evaluated at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_price: Option<f64>,
    pub updated_at: i64,
}

impl Position {
    /// Create a validated open position.
    pub fn new(
        symbol: String,
        amount: f64,
        entry_price: f64,
        stop_loss: f64,
        target_1: f64,
        target_2: f64,
    ) -> Result<Self, TradingError> {
        if symbol.trim().is_empty() {
            return Err(TradingError::InvalidPosition("empty symbol".to_string()));
        }
        let all_finite = [amount, entry_price, stop_loss, target_1, target_2]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || amount <= 0.0 || entry_price <= 0.0 || stop_loss < 0.0 {
            return Err(TradingError::InvalidPosition(format!(
                "amount and prices must be positive and finite for {}",
                symbol
            )));
        }
        if !(stop_loss < entry_price && entry_price < target_1 && target_1 <= target_2) {
            return Err(TradingError::InvalidPosition(format!(
                "levels must satisfy stop_loss < entry < target_1 <= target_2 for {} \
                 (got {} / {} / {} / {})",
                symbol, stop_loss, entry_price, target_1, target_2
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol,
            amount,
            initial_amount: amount,
            entry_price,
            current_price: entry_price,
            stop_loss,
            target_1,
            target_2,
            entry_date: now,
            status: PositionStatus::Open,
            target1_hit: false,
            partial_exits: Vec::new(),
            realized_pnl_pct: 0.0,
            last_evaluated_price: None,
            updated_at: now,
        })
    }

    /// Capital committed at entry for the remaining amount.
    pub fn cost_basis(&self) -> f64 {
        self.amount * self.entry_price
    }

    /// Unrealized return of the remaining amount at the current mark.
    pub fn unrealized_pnl_pct(&self) -> f64 {
        pnl_pct(SignalAction::Buy, self.entry_price, self.current_price)
    }

    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    /// Apply one price update.
    ///
    /// Rules, first match wins:
    /// 1. price <= stop_loss: close everything ("Stop Loss").
    /// 2. price >= target_1 and target 1 not yet hit: exit half, move the stop
    ///    to breakeven ("Target 1").
    /// 3. price >= target_2: close everything ("Target 2").
    ///
    /// Repeating the last evaluated price is a no-op, except that a remainder
    /// left above target 2 by a gapped target 1 exit closes on the next tick.
    pub fn apply_price(&mut self, price: f64) -> Result<PositionEvent, TradingError> {
        if self.is_closed() {
            return Err(TradingError::InvalidTransition(format!(
                "position {} for {} is already closed",
                self.id, self.symbol
            )));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::InvalidPosition(format!(
                "invalid price {} for {}",
                price, self.symbol
            )));
        }
        let pending_target_2 = self.target1_hit && price >= self.target_2;
        if self.last_evaluated_price == Some(price) && !pending_target_2 {
            return Ok(PositionEvent::Unchanged);
        }

        self.current_price = price;
        self.last_evaluated_price = Some(price);
        self.updated_at = chrono::Utc::now().timestamp_millis();

        if price <= self.stop_loss {
            return Ok(PositionEvent::Closed(self.close(price, ExitReason::StopLoss)));
        }

        if price >= self.target_1 && !self.target1_hit {
            let half = self.amount * 0.5;
            let exit = self.exit(price, half, ExitReason::Target1);
            self.target1_hit = true;
            self.stop_loss = self.entry_price;
            self.status = PositionStatus::PartiallyClosed;
            return Ok(PositionEvent::PartialExit(exit));
        }

        if price >= self.target_2 {
            return Ok(PositionEvent::Closed(self.close(price, ExitReason::Target2)));
        }

        Ok(PositionEvent::Unchanged)
    }

    /// Exit the whole remaining amount.
    pub fn close(&mut self, price: f64, reason: ExitReason) -> PartialExit {
        let remaining = self.amount;
        let exit = self.exit(price, remaining, reason);
        self.amount = 0.0;
        self.status = PositionStatus::Closed;
        exit
    }

    fn exit(&mut self, price: f64, amount: f64, reason: ExitReason) -> PartialExit {
        let amount = amount.min(self.amount).max(0.0);
        let pnl = pnl_pct(SignalAction::Buy, self.entry_price, price);
        let exit = PartialExit {
            date: chrono::Utc::now().timestamp_millis(),
            price,
            amount,
            pnl_pct: pnl,
            reason,
        };

        self.amount -= amount;
        if self.initial_amount > 0.0 {
            self.realized_pnl_pct += pnl * amount / self.initial_amount;
        }
        self.current_price = price;
        self.partial_exits.push(exit.clone());
        exit
    }
}

// =============================================================================
// Trade history and performance
// =============================================================================

/// A closed position as recorded in the portfolio history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub entry_price: f64,
    /// Price of the final exit.
    pub exit_price: f64,
    /// Amount at entry.
    pub amount: f64,
    /// Return over the whole position, weighted across exits.
    pub pnl_pct: f64,
    pub opened_at: i64,
    pub closed_at: i64,
    pub duration_secs: i64,
    pub exit_reason: ExitReason,
    pub partial_exits: Vec<PartialExit>,
}

impl TradeRecord {
    /// Build from a position that has just been closed.
    pub fn from_closed(position: &Position, final_exit: &PartialExit) -> Self {
        Self {
            id: position.id.clone(),
            symbol: position.symbol.clone(),
            entry_price: position.entry_price,
            exit_price: final_exit.price,
            amount: position.initial_amount,
            pnl_pct: position.realized_pnl_pct,
            opened_at: position.entry_date,
            closed_at: final_exit.date,
            duration_secs: (final_exit.date - position.entry_date).max(0) / 1000,
            exit_reason: final_exit.reason,
            partial_exits: position.partial_exits.clone(),
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl_pct > 0.0
    }
}

/// Aggregate trade statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub total_profit_pct: f64,
    /// Largest single losing trade, as a positive percentage.
    pub max_drawdown_pct: f64,
}

impl Performance {
    pub fn record(&mut self, trade: &TradeRecord) {
        self.total_trades += 1;
        if trade.is_win() {
            self.winning_trades += 1;
        }
        self.total_profit_pct += trade.pnl_pct;
        if trade.pnl_pct < 0.0 {
            self.max_drawdown_pct = self.max_drawdown_pct.max(trade.pnl_pct.abs());
        }
    }

    /// Winning trades as a percentage of all trades (0 if none).
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.total_trades as f64 * 100.0
        }
    }
}

/// Capital and statistics shared across all symbols.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    /// Initial capital.
    pub capital: f64,
    /// Free cash.
    pub current_capital: f64,
    pub performance: Performance,
}

impl AccountState {
    pub fn new(capital: f64) -> Self {
        Self {
            capital,
            current_capital: capital,
            performance: Performance::default(),
        }
    }
}

// =============================================================================
// Portfolio views
// =============================================================================

/// Full point-in-time copy of the portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    pub capital: f64,
    pub current_capital: f64,
    pub positions: HashMap<String, Position>,
    pub history: Vec<TradeRecord>,
    pub performance: Performance,
}

impl Portfolio {
    pub fn summary(&self) -> PortfolioSummary {
        PortfolioSummary {
            capital: self.capital,
            current_capital: self.current_capital,
            open_count: self.positions.len(),
            win_rate: self.performance.win_rate(),
            total_profit_pct: self.performance.total_profit_pct,
            max_drawdown_pct: self.performance.max_drawdown_pct,
        }
    }
}

/// Headline portfolio numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub capital: f64,
    pub current_capital: f64,
    pub open_count: usize,
    pub win_rate: f64,
    pub total_profit_pct: f64,
    pub max_drawdown_pct: f64,
}

/// Request to open a long position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub symbol: String,
    pub amount: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub target_1: f64,
    pub target_2: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> Position {
        Position::new("BTCUSDT".to_string(), 2.0, 100.0, 99.0, 102.0, 103.0).unwrap()
    }

    #[test]
    fn test_new_position_is_open() {
        let pos = position();
        assert_eq!(pos.status, PositionStatus::Open);
        assert_eq!(pos.amount, 2.0);
        assert_eq!(pos.current_price, 100.0);
        assert!(!pos.target1_hit);
        assert_eq!(pos.cost_basis(), 200.0);
    }

    #[test]
    fn test_rejects_inverted_levels() {
        let err = Position::new("BTC".to_string(), 1.0, 100.0, 101.0, 102.0, 103.0);
        assert!(matches!(err, Err(TradingError::InvalidPosition(_))));
        let err = Position::new("BTC".to_string(), 0.0, 100.0, 99.0, 102.0, 103.0);
        assert!(matches!(err, Err(TradingError::InvalidPosition(_))));
    }

    #[test]
    fn test_price_between_levels_is_unchanged() {
        let mut pos = position();
        assert_eq!(pos.apply_price(101.0).unwrap(), PositionEvent::Unchanged);
        assert_eq!(pos.current_price, 101.0);
        assert!((pos.unrealized_pnl_pct() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_target_1_moves_stop_to_breakeven() {
        let mut pos = position();
        let event = pos.apply_price(102.5).unwrap();
        match event {
            PositionEvent::PartialExit(exit) => {
                assert_eq!(exit.reason, ExitReason::Target1);
                assert_eq!(exit.amount, 1.0);
                assert!((exit.pnl_pct - 2.5).abs() < 1e-9);
            }
            other => panic!("expected partial exit, got {:?}", other),
        }
        assert_eq!(pos.status, PositionStatus::PartiallyClosed);
        assert_eq!(pos.stop_loss, 100.0);
        assert_eq!(pos.amount, 1.0);
        assert!((pos.realized_pnl_pct - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_price_is_idempotent() {
        let mut pos = position();
        pos.apply_price(102.5).unwrap();
        let snapshot = pos.clone();
        assert_eq!(pos.apply_price(102.5).unwrap(), PositionEvent::Unchanged);
        assert_eq!(pos, snapshot);
    }

    #[test]
    fn test_repeated_price_above_target_2_closes_remainder() {
        let mut pos = position();
        assert!(matches!(pos.apply_price(103.0).unwrap(), PositionEvent::PartialExit(_)));

        let PositionEvent::Closed(exit) = pos.apply_price(103.0).unwrap() else {
            panic!("expected close");
        };
        assert_eq!(exit.reason, ExitReason::Target2);
        assert_eq!(exit.amount, 1.0);
        assert!(pos.is_closed());
        assert_eq!(pos.partial_exits.len(), 2);
    }

    #[test]
    fn test_closed_position_rejects_updates() {
        let mut pos = position();
        pos.apply_price(98.0).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.amount, 0.0);
        assert!(matches!(
            pos.apply_price(105.0),
            Err(TradingError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_performance_tracks_worst_loss() {
        let mut perf = Performance::default();
        let mut pos = position();
        let exit = pos.close(97.0, ExitReason::StopLoss);
        perf.record(&TradeRecord::from_closed(&pos, &exit));
        let mut pos = position();
        let exit = pos.close(99.0, ExitReason::StopLoss);
        perf.record(&TradeRecord::from_closed(&pos, &exit));

        assert_eq!(perf.total_trades, 2);
        assert_eq!(perf.winning_trades, 0);
        assert!((perf.max_drawdown_pct - 3.0).abs() < 1e-9);
        assert!((perf.total_profit_pct + 4.0).abs() < 1e-9);
        assert_eq!(perf.win_rate(), 0.0);
    }
}
