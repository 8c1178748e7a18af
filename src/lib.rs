//! Cryptoscope - crypto signal engine with paper position tracking

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use config::Config;
use services::{Engine, Poller};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<Engine>,
    pub poller: Arc<Poller>,
}

// Re-export commonly used types
pub use types::*;
