use base64::prelude::*;
use bitcoin::secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rpc::{
    AssetDaemon, WalletDaemon,
    types::{CommitVirtualPsbtsRequest, UpdateVirtualPsbtRequest, UpdateVirtualPsbtResponse},
};

use super::{SwapError, Swapper, TARGET_CONF, selector::script_key, sell::require};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyStartRequest {
    pub psbt: String,
    pub anchor_psbt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyCompleteRequest {
    pub psbt: String,
    pub anchor_psbt: String,
    pub amount_sats_to_pay: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyCompleteResponse {
    pub signed_virtual_psbt: String,
    /// Fully signed anchor transaction PSBT, hex.
    pub modified_anchor_psbt: String,
}

impl BuyStartRequest {
    pub fn validate(&self) -> Result<(), SwapError> {
        require("psbt", &self.psbt)?;
        require("anchor_psbt", &self.anchor_psbt)
    }
}

impl BuyCompleteRequest {
    pub fn validate(&self) -> Result<(), SwapError> {
        require("psbt", &self.psbt)?;
        require("anchor_psbt", &self.anchor_psbt)?;
        if self.amount_sats_to_pay == 0 {
            return Err(SwapError::InvalidRequest(
                "amount_sats_to_pay must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl<A: AssetDaemon, W: WalletDaemon> Swapper<A, W> {
    /// Redirects the seller's virtual output to the buyer's script key.
    pub async fn buy_start(
        &self,
        caller: &XOnlyPublicKey,
        request: BuyStartRequest,
    ) -> Result<UpdateVirtualPsbtResponse, SwapError> {
        request.validate()?;
        let updated = self
            .assets
            .update_virtual_psbt(&UpdateVirtualPsbtRequest {
                virtual_psbt: request.psbt,
                script_key: script_key(caller),
                anchor_psbt: request.anchor_psbt,
            })
            .await
            .map_err(SwapError::rpc("update virtual PSBT"))?;
        info!("Updated virtual PSBT for buyer {}", caller);
        Ok(updated)
    }

    /// Commits the buyer's funding and has the wallet sign and finalize the
    /// anchor transaction.
    pub async fn buy_complete(
        &self,
        request: BuyCompleteRequest,
    ) -> Result<BuyCompleteResponse, SwapError> {
        request.validate()?;

        let committed = self
            .assets
            .commit_virtual_psbts(&CommitVirtualPsbtsRequest {
                virtual_psbts: vec![request.psbt],
                passive_asset_psbts: vec![],
                anchor_psbt: request.anchor_psbt,
                add_change_output: true,
                target_conf: TARGET_CONF,
            })
            .await
            .map_err(SwapError::rpc("commit virtual PSBTs"))?;
        info!(
            "Committed buy of {} sats with {} locked wallet UTXOs",
            request.amount_sats_to_pay,
            committed.lnd_locked_utxos.len()
        );

        let locked = committed.lnd_locked_utxos.clone();
        self.after_commit(locked, move |swapper| async move {
            let signed_virtual = committed
                .virtual_psbts
                .first()
                .cloned()
                .ok_or_else(|| SwapError::unexpected("commit virtual PSBTs", "no virtual PSBTs"))?;

            let anchor = hex::decode(&committed.anchor_psbt)
                .map_err(|e| SwapError::unexpected("commit virtual PSBTs", e.to_string()))?;
            let signed = swapper
                .wallet
                .sign_psbt(&BASE64_STANDARD.encode(anchor))
                .await
                .map_err(SwapError::rpc("sign anchor PSBT"))?;
            let finalized = swapper
                .wallet
                .finalize_psbt(&signed.signed_psbt)
                .await
                .map_err(SwapError::rpc("finalize anchor PSBT"))?;
            let finalized = BASE64_STANDARD
                .decode(&finalized.signed_psbt)
                .map_err(|e| SwapError::unexpected("finalize anchor PSBT", e.to_string()))?;

            Ok::<_, SwapError>(BuyCompleteResponse {
                signed_virtual_psbt: signed_virtual,
                modified_anchor_psbt: hex::encode(finalized),
            })
        })
        .await
    }
}
