use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::TradingError;
use crate::sources::DataError;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Trading(#[from] TradingError),

    #[error(transparent)]
    Data(#[from] DataError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Trading(e) => match e {
                TradingError::InsufficientCapital { .. } | TradingError::InvalidPosition(_) => {
                    StatusCode::BAD_REQUEST
                }
                TradingError::PositionExists(_) => StatusCode::CONFLICT,
                TradingError::PositionNotFound(_) => StatusCode::NOT_FOUND,
                TradingError::InvalidTransition(_) | TradingError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Data(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
