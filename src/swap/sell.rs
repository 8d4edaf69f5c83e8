use base64::prelude::*;
use bitcoin::{Address, address::NetworkUnchecked, secp256k1::XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rpc::{
    AssetDaemon, WalletDaemon,
    types::{
        CommitVirtualPsbtsRequest, CreateInteractiveSendTemplateRequest, FundVirtualPsbtRequest,
        FundVirtualPsbtResponse, PrepareAnchoringTemplateRequest,
    },
};

use super::{
    Order, SwapError, Swapper, TARGET_CONF,
    selector::{script_key, select_exact, select_owned},
    surgeon,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellStartRequest {
    pub asset_id: String,
    pub amount_to_sell: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellStartResponse {
    #[serde(flatten)]
    pub funded: FundVirtualPsbtResponse,
    pub sighash_hex_to_sign: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellCompleteRequest {
    pub psbt: String,
    pub sighash_hex: String,
    pub signature_hex: String,
    pub amount_sats_to_receive: u64,
    #[serde(default)]
    pub receive_btc_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellCompleteResponse {
    pub signed_virtual_psbt: String,
    /// Seller-signed anchor PSBT, hex, waiting for the buyer's inputs.
    pub modified_anchor_psbt: String,
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), SwapError> {
    if value.trim().is_empty() {
        return Err(SwapError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}

impl SellStartRequest {
    pub fn validate(&self) -> Result<(), SwapError> {
        require("asset_id", &self.asset_id)?;
        if hex::decode(&self.asset_id).is_err() {
            return Err(SwapError::InvalidRequest("asset_id must be hex".to_string()));
        }
        if self.amount_to_sell == 0 {
            return Err(SwapError::InvalidRequest(
                "amount_to_sell must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl SellCompleteRequest {
    pub fn validate(&self) -> Result<(), SwapError> {
        require("psbt", &self.psbt)?;
        require("sighash_hex", &self.sighash_hex)?;
        require("signature_hex", &self.signature_hex)?;
        if self.amount_sats_to_receive == 0 {
            return Err(SwapError::InvalidRequest(
                "amount_sats_to_receive must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl<A: AssetDaemon, W: WalletDaemon> Swapper<A, W> {
    fn payout_address(&self, address: Option<&str>) -> Result<Option<Address>, SwapError> {
        let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
            return Ok(None);
        };
        address
            .parse::<Address<NetworkUnchecked>>()
            .and_then(|a| a.require_network(self.network))
            .map(Some)
            .map_err(|e| SwapError::InvalidRequest(format!("receive_btc_address: {}", e)))
    }

    /// Locks in an exact-amount asset UTXO for sale and returns the funded
    /// virtual PSBT with the sighash the seller must sign.
    pub async fn sell_start(
        &self,
        caller: &XOnlyPublicKey,
        request: SellStartRequest,
    ) -> Result<SellStartResponse, SwapError> {
        request.validate()?;

        let utxos = self
            .assets
            .list_utxos()
            .await
            .map_err(SwapError::rpc("list asset UTXOs"))?;
        let owned = select_owned(&utxos, caller, &request.asset_id);
        let selected = select_exact(&owned, &request.asset_id, request.amount_to_sell)?;
        info!(
            "Selling {} of {} from {}",
            selected.amount, selected.asset_id, selected.outpoint
        );

        let template = self
            .assets
            .create_interactive_send_template(&CreateInteractiveSendTemplateRequest {
                asset_id: request.asset_id.clone(),
                amount: request.amount_to_sell,
                script_key: script_key(caller),
                anchor_internal_key: selected.internal_key.clone(),
            })
            .await
            .map_err(SwapError::rpc("create interactive send template"))?;

        let funded = self
            .assets
            .fund_virtual_psbt(&FundVirtualPsbtRequest::Template {
                psbt: template.virtual_psbt,
                inputs: vec![selected.prev_id()],
            })
            .await
            .map_err(SwapError::rpc("fund virtual PSBT"))?;

        let sighash = self
            .signing
            .solicit(&self.assets, &funded.funded_psbt)
            .await?;

        let order = Order::builder()
            .asset_id(request.asset_id)
            .amount_to_sell(request.amount_to_sell)
            .outpoint(selected.outpoint.into())
            .build();
        self.ledger(move |orders| orders.write_pending(&order))
            .await?;

        Ok(SellStartResponse {
            funded,
            sighash_hex_to_sign: sighash,
        })
    }

    /// Signs the seller's half with the external signature, anchors it and
    /// returns the stripped, wallet-signed anchor PSBT for the buyer.
    pub async fn sell_complete(
        &self,
        request: SellCompleteRequest,
    ) -> Result<SellCompleteResponse, SwapError> {
        request.validate()?;
        let destination = self.payout_address(request.receive_btc_address.as_deref())?;

        let signed_virtual = self
            .signing
            .finalize(
                &self.assets,
                &request.psbt,
                &request.sighash_hex,
                &request.signature_hex,
            )
            .await?;

        let template = self
            .assets
            .prepare_anchoring_template(&PrepareAnchoringTemplateRequest {
                virtual_psbt: signed_virtual.clone(),
                output_amt: request.amount_sats_to_receive,
            })
            .await
            .map_err(SwapError::rpc("prepare anchoring template"))?;

        let committed = self
            .assets
            .commit_virtual_psbts(&CommitVirtualPsbtsRequest {
                virtual_psbts: vec![signed_virtual.clone()],
                passive_asset_psbts: vec![],
                anchor_psbt: template.anchor_psbt.clone(),
                add_change_output: true,
                target_conf: TARGET_CONF,
            })
            .await
            .map_err(SwapError::rpc("commit virtual PSBTs"))?;
        info!(
            "Committed anchor with {} locked wallet UTXOs",
            committed.lnd_locked_utxos.len()
        );

        let locked = committed.lnd_locked_utxos.clone();
        let amount_sats_to_receive = request.amount_sats_to_receive;
        self.after_commit(locked, move |swapper| async move {
            let stripped = surgeon::strip(&committed.anchor_psbt, destination.as_ref())?;
            let outpoint = surgeon::funding_outpoint(&stripped)?;

            let stripped_bytes = hex::decode(&stripped).map_err(surgeon::SurgeryError::from)?;
            let signed = swapper
                .wallet
                .sign_psbt(&BASE64_STANDARD.encode(stripped_bytes))
                .await
                .map_err(SwapError::rpc("sign anchor PSBT"))?;
            let signed_anchor = BASE64_STANDARD
                .decode(&signed.signed_psbt)
                .map_err(|e| SwapError::unexpected("sign anchor PSBT", e.to_string()))?;

            let virtual_psbt = signed_virtual.clone();
            swapper
                .ledger(move |orders| {
                    let order = orders.read_pending(&outpoint)?.complete(
                        amount_sats_to_receive,
                        virtual_psbt,
                        template.anchor_psbt,
                        committed.virtual_psbts,
                    );
                    orders.promote(&order)
                })
                .await?;

            Ok::<_, SwapError>(SellCompleteResponse {
                signed_virtual_psbt: signed_virtual,
                modified_anchor_psbt: hex::encode(signed_anchor),
            })
        })
        .await
    }
}
