use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Outpoint as the daemons spell it on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: String,
    pub output_index: u32,
}

impl From<bitcoin::OutPoint> for Outpoint {
    fn from(outpoint: bitcoin::OutPoint) -> Self {
        Self {
            txid: outpoint.txid.to_string(),
            output_index: outpoint.vout,
        }
    }
}

impl std::fmt::Display for Outpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.txid, self.output_index)
    }
}

// Asset daemon

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetGenesis {
    pub genesis_point: String,
    pub name: String,
    pub meta_hash: String,
    pub asset_id: String,
    pub asset_type: String,
    pub output_index: u32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ManagedAsset {
    pub asset_genesis: AssetGenesis,
    pub amount: String,
    pub script_key: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ManagedUtxo {
    pub out_point: String,
    pub internal_key: String,
    pub assets: Vec<ManagedAsset>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListUtxosResponse {
    pub managed_utxos: HashMap<String, ManagedUtxo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateInteractiveSendTemplateRequest {
    pub asset_id: String,
    pub amount: u64,
    pub script_key: String,
    pub anchor_internal_key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VirtualPsbtTemplate {
    #[serde(rename = "psbt")]
    pub virtual_psbt: String,
}

/// Asset input reference handed to the funding RPC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PrevId {
    pub outpoint: Outpoint,
    pub id: String,
    pub script_key: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RawTemplate {
    pub recipients: BTreeMap<String, u64>,
    pub inputs: Vec<PrevId>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum FundVirtualPsbtRequest {
    /// Fund a daemon-built template with exactly the given inputs.
    Template { psbt: String, inputs: Vec<PrevId> },
    /// Fund a transfer to the listed recipients from the given inputs.
    Raw { raw: RawTemplate },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundVirtualPsbtResponse {
    pub funded_psbt: String,
    pub change_output_index: i32,
    pub passive_asset_psbts: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SignVirtualPsbtRequest<'a> {
    pub funded_psbt: &'a str,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignVirtualPsbtResponse {
    pub signed_psbt: String,
    pub signed_inputs: Vec<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PrepareAnchoringTemplateRequest {
    pub virtual_psbt: String,
    pub output_amt: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PrepareAnchoringTemplateResponse {
    pub anchor_psbt: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CommitVirtualPsbtsRequest {
    pub virtual_psbts: Vec<String>,
    pub passive_asset_psbts: Vec<String>,
    pub anchor_psbt: String,
    #[serde(rename = "add")]
    pub add_change_output: bool,
    pub target_conf: u32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommitVirtualPsbtsResponse {
    pub anchor_psbt: String,
    pub virtual_psbts: Vec<String>,
    pub passive_asset_psbts: Vec<String>,
    pub change_output_index: i32,
    pub lnd_locked_utxos: Vec<Outpoint>,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdateVirtualPsbtRequest {
    pub virtual_psbt: String,
    pub script_key: String,
    pub anchor_psbt: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateVirtualPsbtResponse {
    pub updated_virtual_psbt: String,
    pub updated_anchor_psbt: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnchorVirtualPsbtsRequest {
    pub virtual_psbts: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DecodeAddrRequest<'a> {
    pub addr: &'a str,
}

/// A taproot-asset address, as decoded or freshly issued by the daemon.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapAddress {
    pub encoded: String,
    pub asset_id: String,
    pub amount: String,
    pub script_key: String,
    pub internal_key: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScriptKeyDescriptor {
    pub pub_key: String,
    pub key_desc: RawKey,
}

#[derive(Clone, Debug, Serialize)]
pub struct RawKey {
    pub raw_key_bytes: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewAddrRequest {
    pub asset_id: String,
    pub amt: u64,
    pub script_key: ScriptKeyDescriptor,
    pub internal_key: KeyDescriptor,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorBlockHash {
    pub hash: String,
    pub hash_str: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferInput {
    pub anchor_point: String,
    pub asset_id: String,
    pub script_key: String,
    pub amount: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferAnchor {
    pub outpoint: String,
    pub value: String,
    pub internal_key: String,
    pub taproot_asset_root: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOutput {
    pub anchor: TransferAnchor,
    pub script_key: String,
    pub amount: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTransfer {
    pub transfer_timestamp: String,
    pub anchor_tx_hash: String,
    pub anchor_tx_height_hint: u32,
    pub anchor_tx_chain_fees: String,
    pub anchor_tx_block_hash: AnchorBlockHash,
    pub inputs: Vec<TransferInput>,
    pub outputs: Vec<TransferOutput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListTransfersResponse {
    pub transfers: Vec<AssetTransfer>,
}

// Wallet daemon

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLocator {
    pub key_family: u32,
    pub key_index: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDescriptor {
    pub raw_key_bytes: String,
    pub key_loc: KeyLocator,
}

#[derive(Clone, Debug, Serialize)]
pub struct NextKeyRequest {
    pub key_family: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PsbtRequest<'a> {
    pub funded_psbt: &'a str,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignPsbtResponse {
    pub signed_psbt: String,
    pub signed_inputs: Vec<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FinalizePsbtResponse {
    pub signed_psbt: String,
    pub raw_final_tx: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LeaseOutpoint<'a> {
    pub txid_str: &'a str,
    pub output_index: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReleaseOutputRequest<'a> {
    pub id: String,
    pub outpoint: LeaseOutpoint<'a>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Empty {}
