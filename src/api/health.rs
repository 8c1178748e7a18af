use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    poller_running: bool,
    symbols: Vec<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        poller_running: state.poller.is_running(),
        symbols: state.poller.symbols(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
