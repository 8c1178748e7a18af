//! Position lifecycle service.
//!
//! Owns the open positions (one per symbol) and the shared account:
//! - Opening positions against free capital
//! - Applying price ticks (stop loss, target 1 partial exit, target 2)
//! - Crediting exits back to capital and recording closed trades
//!
//! Uses SQLite for persistence and DashMap for per-symbol exclusive access.
//! Lock order is always: symbol entry, then account, then history.

use crate::services::SqliteStore;
use crate::types::{
    AccountState, ExitReason, OpenPositionRequest, PartialExit, Portfolio, PortfolioSummary,
    Position, PositionEvent, TradeRecord, normalize_symbol,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Trading service errors.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Insufficient capital: need {needed}, have {available}")]
    InsufficientCapital { needed: f64, available: f64 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Position already open for {0}")]
    PositionExists(String),

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for TradingError {
    fn from(e: rusqlite::Error) -> Self {
        TradingError::Storage(e.to_string())
    }
}

/// Paper position manager.
pub struct TradingService {
    /// Open positions (symbol -> Position)
    positions: DashMap<String, Position>,
    /// Free capital and performance, shared by all symbols
    account: Mutex<AccountState>,
    /// Closed trades, oldest first
    history: RwLock<Vec<TradeRecord>>,
    /// SQLite store for persistence
    sqlite: Arc<SqliteStore>,
}

impl TradingService {
    /// Create a new trading service with `capital` as initial and free cash.
    pub fn new(sqlite: Arc<SqliteStore>, capital: f64) -> Self {
        Self {
            positions: DashMap::new(),
            account: Mutex::new(AccountState::new(capital)),
            history: RwLock::new(Vec::new()),
            sqlite,
        }
    }

    fn account(&self) -> MutexGuard<'_, AccountState> {
        self.account
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restore account, open positions and trade history from SQLite.
    ///
    /// Without a stored account the configured capital is kept and written out.
    pub fn load(&self) -> Result<(), TradingError> {
        match self.sqlite.load_account()? {
            Some(account) => *self.account() = account,
            None => {
                let account = self.account().clone();
                self.sqlite.save_account(&account)?;
            }
        }

        let positions = self.sqlite.load_positions()?;
        let count = positions.len();
        for position in positions {
            if position.is_closed() {
                warn!("Dropping stored closed position {} for {}", position.id, position.symbol);
                self.sqlite.delete_position(&position.symbol)?;
                continue;
            }
            self.positions.insert(position.symbol.clone(), position);
        }

        let trades = self.sqlite.load_trades()?;
        info!("Loaded {} open positions and {} closed trades", count, trades.len());
        *self.history.write().unwrap_or_else(|p| p.into_inner()) = trades;
        Ok(())
    }

    // ==========================================================================
    // Position Management
    // ==========================================================================

    /// Open a position, committing `amount * entry_price` of free capital.
    ///
    /// Fails without any state change on insufficient capital, invalid levels,
    /// an already open position for the symbol, or a storage failure.
    pub fn open_position(&self, request: OpenPositionRequest) -> Result<Position, TradingError> {
        let symbol = normalize_symbol(&request.symbol);
        let position = Position::new(
            symbol.clone(),
            request.amount,
            request.entry_price,
            request.stop_loss,
            request.target_1,
            request.target_2,
        )?;

        let vacant = match self.positions.entry(symbol.clone()) {
            Entry::Occupied(_) => return Err(TradingError::PositionExists(symbol)),
            Entry::Vacant(vacant) => vacant,
        };

        let mut account = self.account();
        let cost = position.cost_basis();
        if cost > account.current_capital {
            debug!(
                "Rejected {} position: cost {:.2} exceeds free capital {:.2}",
                symbol, cost, account.current_capital
            );
            return Err(TradingError::InsufficientCapital {
                needed: cost,
                available: account.current_capital,
            });
        }

        let mut updated = account.clone();
        updated.current_capital -= cost;
        if let Err(e) = self
            .sqlite
            .save_position(&position)
            .and_then(|_| self.sqlite.save_account(&updated))
        {
            if let Err(cleanup) = self.sqlite.delete_position(&symbol) {
                error!("Failed to roll back stored position {}: {}", symbol, cleanup);
            }
            return Err(e.into());
        }

        *account = updated;
        vacant.insert(position.clone());

        info!(
            "Opened {} position: {} @ {:.4} (stop {:.4}, t1 {:.4}, t2 {:.4}), free capital {:.2}",
            symbol,
            position.amount,
            position.entry_price,
            position.stop_loss,
            position.target_1,
            position.target_2,
            account.current_capital
        );
        Ok(position)
    }

    /// Apply a price update to the open position for `symbol`.
    ///
    /// Returns `Ok(None)` when no position is open for the symbol.
    pub fn tick(&self, symbol: &str, price: f64) -> Result<Option<PositionEvent>, TradingError> {
        let symbol = normalize_symbol(symbol);
        let mut occupied = match self.positions.entry(symbol) {
            Entry::Vacant(_) => return Ok(None),
            Entry::Occupied(occupied) => occupied,
        };

        let event = occupied.get_mut().apply_price(price)?;
        match &event {
            PositionEvent::Unchanged => {
                if let Err(e) = self.sqlite.save_position(occupied.get()) {
                    error!("Failed to persist {} mark price: {}", occupied.key(), e);
                }
            }
            PositionEvent::PartialExit(exit) => {
                let position = occupied.get();
                self.credit(exit);
                if let Err(e) = self.sqlite.save_position(position) {
                    error!("Failed to persist partial exit for {}: {}", position.symbol, e);
                }
                info!(
                    "{} {}: exited {} @ {:.4} ({:+.2}%), stop moved to {:.4}",
                    position.symbol, exit.reason, exit.amount, exit.price, exit.pnl_pct, position.stop_loss
                );
            }
            PositionEvent::Closed(exit) => {
                let (_, position) = occupied.remove_entry();
                self.settle(&position, exit);
            }
        }
        Ok(Some(event))
    }

    /// Close the remainder of the position for `symbol` at `price`.
    pub fn close_position(&self, symbol: &str, price: f64) -> Result<TradeRecord, TradingError> {
        let symbol = normalize_symbol(symbol);
        if !price.is_finite() || price <= 0.0 {
            return Err(TradingError::InvalidPosition(format!(
                "invalid price {} for {}",
                price, symbol
            )));
        }
        let occupied = match self.positions.entry(symbol.clone()) {
            Entry::Vacant(_) => return Err(TradingError::PositionNotFound(symbol)),
            Entry::Occupied(occupied) => occupied,
        };

        let (_, mut position) = occupied.remove_entry();
        let exit = position.close(price, ExitReason::Manual);
        Ok(self.settle(&position, &exit))
    }

    /// Credit an exit to free capital.
    fn credit(&self, exit: &PartialExit) {
        let mut account = self.account();
        account.current_capital += exit.amount * exit.price;
        if let Err(e) = self.sqlite.save_account(&account) {
            error!("Failed to persist account after exit: {}", e);
        }
    }

    /// Book a closed position: credit capital, update performance, append history.
    fn settle(&self, position: &Position, exit: &PartialExit) -> TradeRecord {
        let trade = TradeRecord::from_closed(position, exit);
        {
            let mut account = self.account();
            account.current_capital += exit.amount * exit.price;
            account.performance.record(&trade);
            self.history
                .write()
                .unwrap_or_else(|p| p.into_inner())
                .push(trade.clone());

            if let Err(e) = self.sqlite.save_account(&account) {
                error!("Failed to persist account after closing {}: {}", position.symbol, e);
            }
        }

        if let Err(e) = self.sqlite.delete_position(&position.symbol) {
            error!("Failed to remove stored position {}: {}", position.symbol, e);
        }
        if let Err(e) = self.sqlite.save_trade(&trade) {
            error!("Failed to persist trade {}: {}", trade.id, e);
        }

        info!(
            "Closed {} position ({}): {} exits, total {:+.2}%",
            position.symbol,
            exit.reason,
            position.partial_exits.len(),
            trade.pnl_pct
        );
        trade
    }

    // ==========================================================================
    // Queries
    // ==========================================================================

    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.get(&normalize_symbol(symbol)).map(|p| p.clone())
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(&normalize_symbol(symbol))
    }

    /// Open positions sorted by symbol.
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> =
            self.positions.iter().map(|e| e.value().clone()).collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }

    /// Closed trades, oldest first.
    pub fn history(&self) -> Vec<TradeRecord> {
        self.history
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn free_capital(&self) -> f64 {
        self.account().current_capital
    }

    /// Point-in-time copy of the whole portfolio.
    pub fn portfolio(&self) -> Portfolio {
        // Shard locks must not be taken while holding the account.
        let positions = self
            .positions
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let account = self.account().clone();

        Portfolio {
            capital: account.capital,
            current_capital: account.current_capital,
            positions,
            history: self.history(),
            performance: account.performance,
        }
    }

    pub fn summary(&self) -> PortfolioSummary {
        let open_count = self.positions.len();
        let account = self.account().clone();

        PortfolioSummary {
            capital: account.capital,
            current_capital: account.current_capital,
            open_count,
            win_rate: account.performance.win_rate(),
            total_profit_pct: account.performance.total_profit_pct,
            max_drawdown_pct: account.performance.max_drawdown_pct,
        }
    }
}
