use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::payment::PaymentError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("payment gateway error")]
    Gateway(#[source] PaymentError),

    #[error("payment gateway timed out")]
    GatewayTimeout,

    #[error("Database error")]
    Db(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Timeout => AppError::GatewayTimeout,
            other => AppError::Gateway(other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::EmptyCart => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) | AppError::GatewayTimeout => StatusCode::BAD_REQUEST,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message. Provider and database detail stays in the logs.
    fn client_message(&self) -> String {
        match self {
            AppError::Gateway(_) | AppError::GatewayTimeout => {
                "Payment failed. Please try again.".to_string()
            }
            AppError::Db(_) | AppError::Internal(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Gateway(source) => {
                tracing::error!(error = %source, "payment gateway failure");
            }
            AppError::GatewayTimeout => {
                tracing::error!("payment gateway timed out");
            }
            AppError::Db(source) => {
                tracing::error!(error = %source, "database failure");
            }
            AppError::Internal(source) => {
                tracing::error!(error = %source, "internal failure");
            }
            _ => {}
        }

        let body = ErrorBody {
            error: self.client_message(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
