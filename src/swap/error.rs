use thiserror::Error as ThisError;
use tokio::task::JoinError;

use crate::rpc;

use super::{orders::OrderError, signing::SigningError, surgeon::SurgeryError};

#[derive(ThisError, Debug)]
pub enum SwapError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(
        "No UTXO found with exact amount {requested} for asset {asset_id}, eligible amounts are: {available:?}"
    )]
    NoEligibleUtxo {
        asset_id: String,
        requested: u64,
        available: Vec<u64>,
    },
    #[error("Failed to {step}: {source}")]
    Rpc {
        step: &'static str,
        #[source]
        source: rpc::Error,
    },
    #[error("Unexpected response while trying to {step}: {message}")]
    UnexpectedResponse { step: &'static str, message: String },
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Surgery(#[from] SurgeryError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("Swap task failed: {0}")]
    Task(#[from] JoinError),
}

impl SwapError {
    pub fn rpc(step: &'static str) -> impl FnOnce(rpc::Error) -> SwapError {
        move |source| SwapError::Rpc { step, source }
    }

    pub fn unexpected(step: &'static str, message: impl Into<String>) -> SwapError {
        SwapError::UnexpectedResponse {
            step,
            message: message.into(),
        }
    }
}
