use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error as ThisError;
use tracing::Span;

use crate::swap::{SwapError, orders::OrderError, signing::SigningError};

#[derive(ThisError, Debug)]
pub enum HttpError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl HttpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

fn swap_status(error: &SwapError) -> StatusCode {
    match error {
        SwapError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SwapError::NoEligibleUtxo { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SwapError::Rpc { .. } | SwapError::UnexpectedResponse { .. } => StatusCode::BAD_GATEWAY,
        SwapError::Signing(e) => match e {
            SigningError::UnknownChallenge
            | SigningError::InvalidSignature
            | SigningError::Rejected(_) => StatusCode::BAD_REQUEST,
            SigningError::ChallengeNotDeposited { .. } => StatusCode::BAD_GATEWAY,
            SigningError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        SwapError::Order(OrderError::NotFound(_)) => StatusCode::NOT_FOUND,
        SwapError::Order(OrderError::AlreadyFinal(_)) => StatusCode::CONFLICT,
        SwapError::Order(_) | SwapError::Surgery(_) | SwapError::Task(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub struct Error(anyhow::Error);

impl<E> From<E> for Error
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = if let Some(http_error) = self.0.downcast_ref::<HttpError>() {
            (http_error.status_code(), http_error.to_string())
        } else if let Some(swap_error) = self.0.downcast_ref::<SwapError>() {
            (swap_status(swap_error), swap_error.to_string())
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
        };
        Span::current().record("error", message.clone());
        let error_response = Json(ErrorResponse { error: message });
        (status, error_response).into_response()
    }
}
