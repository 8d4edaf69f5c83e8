use std::str::FromStr;

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use bitcoin::secp256k1::XOnlyPublicKey;
use serde::de::DeserializeOwned;

use super::error::{Error, HttpError};

/// Header the authenticating proxy sets to the caller's x-only public key.
pub const CALLER_KEY_HEADER: &str = "x-public-key";

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CallerKey(pub XOnlyPublicKey);

impl<S: Send + Sync> FromRequestParts<S> for CallerKey {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_KEY_HEADER)
            .ok_or_else(|| HttpError::Unauthorized(format!("missing {} header", CALLER_KEY_HEADER)))?
            .to_str()
            .map_err(|e| HttpError::Unauthorized(format!("invalid {} header: {}", CALLER_KEY_HEADER, e)))?;
        let key = XOnlyPublicKey::from_str(value.trim())
            .map_err(|e| HttpError::Unauthorized(format!("invalid public key: {}", e)))?;
        Ok(CallerKey(key))
    }
}

/// JSON body whose rejections are reported as bad requests in the API's
/// error format.
#[derive(Debug)]
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| HttpError::BadRequest(rejection.body_text()))?;
        Ok(Payload(value))
    }
}
