//! SQLite persistence layer.
//!
//! Acts as a key-value store for engine state: rows are keyed by symbol or
//! record id and carry the record as JSON. State is loaded once at start and
//! written through on every mutation.

use crate::types::{AccountState, Position, SignalRecord, TradeRecord};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const ACCOUNT_KEY: &str = "portfolio";

/// SQLite store for positions, trades, signal records and account state.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!("Could not create database directory {:?}: {}", parent, e);
                }
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS positions (
                symbol TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                closed_at INTEGER NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_closed_at ON trades(closed_at);
            CREATE TABLE IF NOT EXISTS signal_records (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signal_records_symbol ON signal_records(symbol);
            CREATE TABLE IF NOT EXISTS account (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL
            );",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Position Methods ==========

    /// Insert or replace the open position for its symbol.
    pub fn save_position(&self, position: &Position) -> Result<(), rusqlite::Error> {
        let data = to_json(position)?;
        self.conn().execute(
            "INSERT INTO positions (symbol, data) VALUES (?1, ?2)
             ON CONFLICT(symbol) DO UPDATE SET data = excluded.data",
            params![position.symbol, data],
        )?;
        debug!("Saved position {}", position.symbol);
        Ok(())
    }

    /// Remove the open position for a symbol.
    pub fn delete_position(&self, symbol: &str) -> Result<(), rusqlite::Error> {
        self.conn()
            .execute("DELETE FROM positions WHERE symbol = ?1", params![symbol])?;
        Ok(())
    }

    /// Load all open positions.
    pub fn load_positions(&self) -> Result<Vec<Position>, rusqlite::Error> {
        self.load_rows("SELECT data FROM positions ORDER BY symbol")
    }

    // ========== Trade History Methods ==========

    /// Append a closed trade.
    pub fn save_trade(&self, trade: &TradeRecord) -> Result<(), rusqlite::Error> {
        let data = to_json(trade)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO trades (id, symbol, closed_at, data) VALUES (?1, ?2, ?3, ?4)",
            params![trade.id, trade.symbol, trade.closed_at, data],
        )?;
        Ok(())
    }

    /// Load trade history, oldest first.
    pub fn load_trades(&self) -> Result<Vec<TradeRecord>, rusqlite::Error> {
        self.load_rows("SELECT data FROM trades ORDER BY closed_at ASC, rowid ASC")
    }

    // ========== Account Methods ==========

    pub fn save_account(&self, account: &AccountState) -> Result<(), rusqlite::Error> {
        let data = to_json(account)?;
        self.conn().execute(
            "INSERT INTO account (key, data) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET data = excluded.data",
            params![ACCOUNT_KEY, data],
        )?;
        Ok(())
    }

    pub fn load_account(&self) -> Result<Option<AccountState>, rusqlite::Error> {
        let rows: Vec<AccountState> = self.load_rows_with(
            "SELECT data FROM account WHERE key = ?1",
            params![ACCOUNT_KEY],
        )?;
        Ok(rows.into_iter().next())
    }

    // ========== Signal Record Methods ==========

    /// Insert or update a signal record.
    pub fn save_signal_record(&self, record: &SignalRecord) -> Result<(), rusqlite::Error> {
        let data = to_json(record)?;
        self.conn().execute(
            "INSERT INTO signal_records (id, symbol, timestamp, data) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![record.id, record.symbol, record.timestamp, data],
        )?;
        Ok(())
    }

    /// Load every signal record, oldest first.
    pub fn load_signal_records(&self) -> Result<Vec<SignalRecord>, rusqlite::Error> {
        self.load_rows("SELECT data FROM signal_records ORDER BY timestamp ASC, rowid ASC")
    }

    // ========== Helpers ==========

    fn load_rows<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, rusqlite::Error> {
        self.load_rows_with(sql, [])
    }

    fn load_rows_with<T: DeserializeOwned, P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<T>, rusqlite::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            let data = row?;
            match serde_json::from_str(&data) {
                Ok(value) => out.push(value),
                Err(e) => warn!("Skipping unreadable row: {}", e),
            }
        }
        Ok(out)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}
