//! Portfolio API endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::services::TickOutcome;
use crate::types::{
    OpenPositionRequest, Portfolio, PortfolioSummary, Position, TradeRecord, normalize_symbol,
};
use crate::AppState;

/// Body of a manual price tick.
#[derive(Debug, Deserialize)]
pub struct TickRequest {
    pub symbol: String,
    pub price: f64,
}

/// Body of a manual close; without a price the current market price is used.
#[derive(Debug, Default, Deserialize)]
pub struct CloseRequest {
    pub price: Option<f64>,
}

/// Summary plus the full portfolio.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub summary: PortfolioSummary,
    pub portfolio: Portfolio,
}

/// Create the portfolio router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_portfolio))
        .route("/positions", get(get_positions).post(open_position))
        .route("/positions/:symbol/close", post(close_position))
        .route("/history", get(get_history))
        .route("/tick", post(tick))
}

async fn get_portfolio(State(state): State<AppState>) -> Json<ApiResponse<PortfolioResponse>> {
    let trading = state.engine.trading();
    Json(ApiResponse::new(PortfolioResponse {
        summary: trading.summary(),
        portfolio: trading.portfolio(),
    }))
}

async fn get_positions(State(state): State<AppState>) -> Json<ApiResponse<Vec<Position>>> {
    Json(ApiResponse::new(state.engine.trading().positions()))
}

async fn get_history(State(state): State<AppState>) -> Json<ApiResponse<Vec<TradeRecord>>> {
    Json(ApiResponse::new(state.engine.trading().history()))
}

async fn open_position(
    State(state): State<AppState>,
    Json(request): Json<OpenPositionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Position>>)> {
    let position = state.engine.open_position(request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(position))))
}

async fn tick(
    State(state): State<AppState>,
    Json(request): Json<TickRequest>,
) -> Result<Json<ApiResponse<TickOutcome>>> {
    let outcome = state.engine.tick(&request.symbol, request.price)?;
    Ok(Json(ApiResponse::new(outcome)))
}

async fn close_position(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    body: Option<Json<CloseRequest>>,
) -> Result<Json<ApiResponse<TradeRecord>>> {
    let trading = state.engine.trading();
    if !trading.has_position(&symbol) {
        return Err(AppError::NotFound(format!("No open position for {}", symbol)));
    }

    let price = match body.and_then(|Json(b)| b.price) {
        Some(price) => price,
        None => state.engine.fetch_price(&normalize_symbol(&symbol)).await?,
    };
    let trade = trading.close_position(&symbol, price)?;
    Ok(Json(ApiResponse::new(trade)))
}
