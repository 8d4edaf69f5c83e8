use std::time::Duration;

use reqwest::{Client as HttpClient, ClientBuilder, Response, header::HeaderMap};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::error::Error;

/// Connection settings for one daemon. Each daemon gets its own HTTP client;
/// certificate handling is decided here and never on shared transport state.
#[derive(Clone, Debug)]
pub struct RestConfig {
    pub url: String,
    pub macaroon: String,
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct RestClient {
    client: HttpClient,
    url: String,
    daemon: &'static str,
}

impl RestClient {
    pub fn new(daemon: &'static str, config: RestConfig) -> Result<Self, Error> {
        let client = ClientBuilder::new()
            .default_headers({
                let mut headers = HeaderMap::new();
                headers.insert("Grpc-Metadata-macaroon", config.macaroon.parse()?);
                headers.insert("Content-Type", "application/json".parse()?);
                headers.insert("Accept", "application/json".parse()?);
                headers
            })
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(config.timeout)
            .build()?;

        Ok(RestClient {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            daemon,
        })
    }

    async fn handle_response<T>(&self, response: Response) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Rpc {
                daemon: self.daemon,
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }

    pub async fn get<T>(&self, path: &str) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        debug!("{} GET {}", self.daemon, path);
        let response = self
            .client
            .get(format!("{}{}", self.url, path))
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("{} POST {}", self.daemon, path);
        let response = self
            .client
            .post(format!("{}{}", self.url, path))
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }
}
