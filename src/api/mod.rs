pub mod health;
pub mod portfolio;
pub mod signals;

use crate::AppState;
use axum::Router;
use serde::Serialize;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub meta: ApiMeta,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMeta {
    /// Unix ms when the response was built.
    pub generated_at: i64,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: ApiMeta {
                generated_at: chrono::Utc::now().timestamp_millis(),
            },
        }
    }
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api/signals", signals::router())
        .nest("/api/portfolio", portfolio::router())
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::Config;
    use crate::services::{
        Engine, EngineSettings, Poller, SeriesSource, SignalHistory, SqliteStore, TradingService,
    };
    use crate::types::PriceBar;
    use crate::AppState;
    use std::sync::Arc;
    use std::time::Duration;

    /// State backed by an in-memory store and a flat series at `price`.
    pub fn state(price: f64) -> AppState {
        let config = Config::default();
        let sqlite = Arc::new(SqliteStore::new_in_memory().unwrap());
        let trading = Arc::new(TradingService::new(sqlite.clone(), config.initial_capital));
        let history = SignalHistory::new(sqlite, &config.scoring);
        let series = (0..60)
            .map(|i| PriceBar::new(i * 60_000, price, price, price, price, 100.0))
            .collect();
        let engine = Arc::new(Engine::new(
            Arc::new(SeriesSource::new(series)),
            config.scoring.clone(),
            trading,
            history,
            EngineSettings::from_config(&config),
        ));
        let poller = Arc::new(Poller::new(
            engine.clone(),
            config.symbols.clone(),
            Duration::from_secs(60),
        ));

        AppState {
            config: Arc::new(config),
            engine,
            poller,
        }
    }
}
