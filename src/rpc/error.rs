use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Unexpected error: {0}")]
    Unexpected(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid header value error: {0}")]
    InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
    #[error("{daemon} RPC error (status {status}): {message}")]
    Rpc {
        daemon: &'static str,
        status: u16,
        message: String,
    },
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}
