use std::collections::BTreeMap;

use bitcoin::secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rpc::{
    AssetDaemon, WalletDaemon,
    types::{AssetTransfer, FundVirtualPsbtRequest, RawTemplate, TapAddress},
};

use super::{SwapError, Swapper, selector::select_owned, sell::require};

pub use super::sell::SellStartResponse as SendStartResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeAddressRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendStartRequest {
    pub invoice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendCompleteRequest {
    pub psbt: String,
    pub sighash_hex: String,
    pub signature_hex: String,
}

impl SendCompleteRequest {
    pub fn validate(&self) -> Result<(), SwapError> {
        require("psbt", &self.psbt)?;
        require("sighash_hex", &self.sighash_hex)?;
        require("signature_hex", &self.signature_hex)
    }
}

impl<A: AssetDaemon, W: WalletDaemon> Swapper<A, W> {
    pub async fn decode_address(&self, request: DecodeAddressRequest) -> Result<TapAddress, SwapError> {
        require("address", &request.address)?;
        self.assets
            .decode_addr(request.address.trim())
            .await
            .map_err(SwapError::rpc("decode address"))
    }

    /// Funds a transfer to a taproot-asset address from every UTXO the caller
    /// owns of that asset and solicits the sighash to sign.
    pub async fn send_start(
        &self,
        caller: &XOnlyPublicKey,
        request: SendStartRequest,
    ) -> Result<SendStartResponse, SwapError> {
        require("invoice", &request.invoice)?;
        let invoice = request.invoice.trim().to_string();

        let utxos = self
            .assets
            .list_utxos()
            .await
            .map_err(SwapError::rpc("list asset UTXOs"))?;
        let decoded = self
            .assets
            .decode_addr(&invoice)
            .await
            .map_err(SwapError::rpc("decode address"))?;

        let owned = select_owned(&utxos, caller, &decoded.asset_id);
        if owned.is_empty() {
            return Err(SwapError::NoEligibleUtxo {
                asset_id: decoded.asset_id,
                requested: decoded.amount.parse().unwrap_or_default(),
                available: vec![],
            });
        }
        info!(
            "Sending {} of {} from {} UTXOs",
            decoded.amount,
            decoded.asset_id,
            owned.len()
        );

        let funded = self
            .assets
            .fund_virtual_psbt(&FundVirtualPsbtRequest::Raw {
                raw: RawTemplate {
                    recipients: BTreeMap::from([(invoice, 0)]),
                    inputs: owned.iter().map(|utxo| utxo.prev_id()).collect(),
                },
            })
            .await
            .map_err(SwapError::rpc("fund virtual PSBT"))?;

        let sighash = self
            .signing
            .solicit(&self.assets, &funded.funded_psbt)
            .await?;

        Ok(SendStartResponse {
            funded,
            sighash_hex_to_sign: sighash,
        })
    }

    /// Signs the transfer with the external signature and has the asset
    /// daemon anchor and broadcast it.
    pub async fn send_complete(
        &self,
        request: SendCompleteRequest,
    ) -> Result<AssetTransfer, SwapError> {
        request.validate()?;
        let signed = self
            .signing
            .finalize(
                &self.assets,
                &request.psbt,
                &request.sighash_hex,
                &request.signature_hex,
            )
            .await?;
        let transfer = self
            .assets
            .anchor_virtual_psbts(vec![signed])
            .await
            .map_err(SwapError::rpc("anchor virtual PSBT"))?;
        info!("Anchored transfer {}", transfer.anchor_tx_hash);
        Ok(transfer)
    }
}
