use base64::prelude::*;

use crate::config::Config;

use super::{
    WalletDaemon,
    error::Error,
    rest::{RestClient, RestConfig},
    types::{
        Empty, FinalizePsbtResponse, KeyDescriptor, LeaseOutpoint, NextKeyRequest, Outpoint,
        PsbtRequest, ReleaseOutputRequest, SignPsbtResponse,
    },
};

/// Key family the asset daemon uses for anchor internal keys.
pub const TAPROOT_ASSETS_KEY_FAMILY: u32 = 212;

#[derive(Clone, Debug)]
pub struct Client {
    rest: RestClient,
}

impl Client {
    pub fn new(config: RestConfig) -> Result<Self, Error> {
        Ok(Client {
            rest: RestClient::new("lnd", config)?,
        })
    }

    pub fn new_from_config(config: &Config) -> Result<Self, Error> {
        Client::new(RestConfig {
            url: config.lnd_url.to_owned(),
            macaroon: config.lnd_macaroon.to_owned(),
            accept_invalid_certs: config.lnd_accept_invalid_certs,
            timeout: config.rpc_timeout(),
        })
    }
}

impl WalletDaemon for Client {
    async fn next_internal_key(&self) -> Result<KeyDescriptor, Error> {
        let mut key: KeyDescriptor = self
            .rest
            .post(
                "/v2/wallet/key/next",
                &NextKeyRequest {
                    key_family: TAPROOT_ASSETS_KEY_FAMILY,
                },
            )
            .await?;
        // REST encodes bytes as base64, the asset daemon wants hex
        key.raw_key_bytes = hex::encode(BASE64_STANDARD.decode(&key.raw_key_bytes)?);
        Ok(key)
    }

    async fn sign_psbt(&self, psbt_base64: &str) -> Result<SignPsbtResponse, Error> {
        self.rest
            .post(
                "/v2/wallet/psbt/sign",
                &PsbtRequest {
                    funded_psbt: psbt_base64,
                },
            )
            .await
    }

    async fn finalize_psbt(&self, psbt_base64: &str) -> Result<FinalizePsbtResponse, Error> {
        self.rest
            .post(
                "/v2/wallet/psbt/finalize",
                &PsbtRequest {
                    funded_psbt: psbt_base64,
                },
            )
            .await
    }

    async fn release_output(&self, lease_id: &str, outpoint: &Outpoint) -> Result<(), Error> {
        let id = hex::decode(lease_id)
            .map_err(|e| Error::Unexpected(format!("lease id is not hex: {}", e)))?;
        let _: Empty = self
            .rest
            .post(
                "/v2/wallet/utxos/release",
                &ReleaseOutputRequest {
                    id: BASE64_STANDARD.encode(id),
                    outpoint: LeaseOutpoint {
                        txid_str: &outpoint.txid,
                        output_index: outpoint.output_index,
                    },
                },
            )
            .await?;
        Ok(())
    }
}
