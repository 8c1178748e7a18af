//! Signal API endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{Signal, SignalAction, SignalRecord, SignalStats, SignalStatus};
use crate::AppState;

/// Query parameters for the history endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub symbol: Option<String>,
    /// BUY or SELL.
    #[serde(rename = "type")]
    pub signal_type: Option<String>,
    /// pending, successful or failed.
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// Create the signals router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/history", get(get_history))
        .route("/:symbol", get(get_signal))
}

/// Evaluate a symbol without touching positions or history.
async fn get_signal(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<Signal>>> {
    let signal = state.engine.evaluate(&symbol).await?;
    Ok(Json(ApiResponse::new(signal)))
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<SignalStats>> {
    Json(ApiResponse::new(state.engine.signal_stats()))
}

/// Tracked signal records, newest first.
async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<SignalRecord>>>> {
    let signal_type = match query.signal_type.as_deref() {
        Some(raw) => match SignalAction::from_str(raw) {
            Some(action) if action.is_actionable() => Some(action),
            _ => return Err(AppError::BadRequest(format!("unknown signal type: {}", raw))),
        },
        None => None,
    };
    let status = match query.status.as_deref() {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };

    let records: Vec<SignalRecord> = state
        .engine
        .history()
        .records(query.symbol.as_deref())
        .into_iter()
        .filter(|r| signal_type.map_or(true, |t| r.signal_type == t))
        .filter(|r| status.map_or(true, |s| r.status == s))
        .take(query.limit.unwrap_or(100))
        .collect();

    Ok(Json(ApiResponse::new(records)))
}

fn parse_status(raw: &str) -> Result<SignalStatus> {
    match raw.to_lowercase().as_str() {
        "pending" => Ok(SignalStatus::Pending),
        "successful" => Ok(SignalStatus::Successful),
        "failed" => Ok(SignalStatus::Failed),
        _ => Err(AppError::BadRequest(format!("unknown status: {}", raw))),
    }
}
