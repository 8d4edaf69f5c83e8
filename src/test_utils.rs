use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use base64::prelude::*;
use bitcoin::{
    Address, Amount, Network, OutPoint, Psbt, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness,
    absolute::LockTime,
    hashes::{Hash, sha256},
    key::{Keypair, Secp256k1},
    secp256k1::{Message, SecretKey, XOnlyPublicKey, schnorr},
    transaction::Version,
};
use tokio::{fs, time::sleep};

use crate::{
    rpc::{
        AssetDaemon, Error, WalletDaemon,
        types::{
            AssetGenesis, AssetTransfer, CommitVirtualPsbtsRequest, CommitVirtualPsbtsResponse,
            CreateInteractiveSendTemplateRequest, FinalizePsbtResponse, FundVirtualPsbtRequest,
            FundVirtualPsbtResponse, KeyDescriptor, KeyLocator, ListTransfersResponse,
            ListUtxosResponse, ManagedAsset, ManagedUtxo, NewAddrRequest, Outpoint,
            PrepareAnchoringTemplateRequest, PrepareAnchoringTemplateResponse, SignPsbtResponse,
            SignVirtualPsbtResponse, TapAddress, TransferAnchor, TransferOutput,
            UpdateVirtualPsbtRequest, UpdateVirtualPsbtResponse, VirtualPsbtTemplate,
        },
    },
    swap::{OrderStore, SignatureSlots, SigningChannel, Swapper, selector::script_key},
};

pub const LEASE_ID: &str = "00ff00ff";

fn keypair(byte: u8) -> Keypair {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[byte; 32]).expect("valid secret key");
    Keypair::from_secret_key(&secp, &secret)
}

pub fn caller_key() -> XOnlyPublicKey {
    keypair(1).x_only_public_key().0
}

pub fn other_key() -> XOnlyPublicKey {
    keypair(2).x_only_public_key().0
}

pub fn outpoint(index: u32) -> OutPoint {
    OutPoint {
        txid: Txid::from_byte_array([index as u8 + 1; 32]),
        vout: index,
    }
}

pub fn regtest_address() -> Address {
    Address::p2tr(&Secp256k1::new(), other_key(), None, Network::Regtest)
}

/// Daemon UTXO listing with one asset per UTXO: `(outpoint index, owner,
/// asset id, amount)`.
pub fn managed_utxos(entries: &[(u32, &XOnlyPublicKey, &str, u64)]) -> ListUtxosResponse {
    let managed_utxos = entries
        .iter()
        .map(|(index, owner, asset_id, amount)| {
            let out_point = outpoint(*index).to_string();
            let utxo = ManagedUtxo {
                out_point: out_point.clone(),
                internal_key: format!("internal-{}", index),
                assets: vec![ManagedAsset {
                    asset_genesis: AssetGenesis {
                        asset_id: asset_id.to_string(),
                        name: format!("asset-{}", asset_id),
                        ..Default::default()
                    },
                    amount: amount.to_string(),
                    script_key: script_key(owner),
                }],
            };
            (out_point, utxo)
        })
        .collect::<HashMap<_, _>>();
    ListUtxosResponse { managed_utxos }
}

/// Unsigned anchor PSBT spending `outpoint(0..inputs)` into `outputs`
/// outputs of increasing value.
pub fn anchor_psbt(inputs: usize, outputs: usize) -> Psbt {
    let secp = Secp256k1::new();
    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: (0..inputs)
            .map(|i| TxIn {
                previous_output: outpoint(i as u32),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
                witness: Witness::new(),
            })
            .collect(),
        output: (0..outputs)
            .map(|i| TxOut {
                value: Amount::from_sat(10_000 * (i as u64 + 1)),
                script_pubkey: ScriptBuf::new_p2tr(
                    &secp,
                    if i == 0 { caller_key() } else { other_key() },
                    None,
                ),
            })
            .collect(),
    };
    Psbt::from_unsigned_tx(tx).expect("unsigned transaction")
}

pub fn anchor_psbt_hex(inputs: usize, outputs: usize) -> String {
    hex::encode(anchor_psbt(inputs, outputs).serialize())
}

/// Sighash the mock asset daemon deposits for `psbt`.
pub fn mock_sighash(psbt: &str) -> String {
    sha256::Hash::hash(psbt.as_bytes()).to_string()
}

/// Schnorr signature by the caller's key over a deposited sighash.
pub fn mock_signature(sighash: &str) -> String {
    let secp = Secp256k1::new();
    let digest: [u8; 32] = hex::decode(sighash)
        .expect("hex sighash")
        .try_into()
        .expect("32 byte sighash");
    let signature = secp.sign_schnorr_no_aux_rand(&Message::from_digest(digest), &keypair(1));
    hex::encode(signature.serialize())
}

fn verify_signature(sighash: &str, signature: &str) -> bool {
    let secp = Secp256k1::new();
    let digest = hex::decode(sighash)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok());
    let signature = hex::decode(signature)
        .ok()
        .and_then(|bytes| schnorr::Signature::from_slice(&bytes).ok());
    match (digest, signature) {
        (Some(digest), Some(signature)) => secp
            .verify_schnorr(&signature, &Message::from_digest(digest), &caller_key())
            .is_ok(),
        _ => false,
    }
}

fn rpc_error(daemon: &'static str, message: impl Into<String>) -> Error {
    Error::Rpc {
        daemon,
        status: 500,
        message: message.into(),
    }
}

#[derive(Debug)]
pub struct AssetState {
    pub utxos: ListUtxosResponse,
    pub transfers: Vec<AssetTransfer>,
    pub decoded: TapAddress,
    pub commit_anchor_psbt: String,
    pub locked_utxos: Vec<Outpoint>,
    pub deposit_sighash: bool,
    pub fail_commit: bool,
    pub calls: Vec<&'static str>,
    pub fund_requests: Vec<serde_json::Value>,
    pub commit_requests: Vec<serde_json::Value>,
}

/// In-process asset daemon. Signing follows the real daemon's external
/// signer contract: without `signature.hex` it deposits the sighash into
/// `sighash.hex` and fails, with it the signature must verify against the
/// deposited sighash.
#[derive(Clone, Debug)]
pub struct MockAssetDaemon {
    sigs_dir: PathBuf,
    state: Arc<Mutex<AssetState>>,
}

impl MockAssetDaemon {
    pub fn new(sigs_dir: &Path) -> Self {
        Self {
            sigs_dir: sigs_dir.to_path_buf(),
            state: Arc::new(Mutex::new(AssetState {
                utxos: ListUtxosResponse::default(),
                transfers: vec![],
                decoded: TapAddress::default(),
                commit_anchor_psbt: anchor_psbt_hex(2, 3),
                locked_utxos: vec![],
                deposit_sighash: true,
                fail_commit: false,
                calls: vec![],
                fund_requests: vec![],
                commit_requests: vec![],
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, AssetState> {
        self.state.lock().expect("mock state")
    }

    pub fn set_deposit_sighash(&self, deposit: bool) {
        self.state().deposit_sighash = deposit;
    }

    fn record(&self, call: &'static str) {
        self.state().calls.push(call);
    }
}

impl AssetDaemon for MockAssetDaemon {
    async fn list_utxos(&self) -> Result<ListUtxosResponse, Error> {
        self.record("list_utxos");
        Ok(self.state().utxos.clone())
    }

    async fn create_interactive_send_template(
        &self,
        request: &CreateInteractiveSendTemplateRequest,
    ) -> Result<VirtualPsbtTemplate, Error> {
        self.record("create_interactive_send_template");
        Ok(VirtualPsbtTemplate {
            virtual_psbt: format!(
                "template:{}:{}:{}",
                request.asset_id, request.amount, request.anchor_internal_key
            ),
        })
    }

    async fn fund_virtual_psbt(
        &self,
        request: &FundVirtualPsbtRequest,
    ) -> Result<FundVirtualPsbtResponse, Error> {
        self.record("fund_virtual_psbt");
        self.state().fund_requests.push(serde_json::to_value(request)?);
        let funded_psbt = match request {
            FundVirtualPsbtRequest::Template { psbt, inputs } => {
                format!("funded:{}:{}", psbt, inputs.len())
            }
            FundVirtualPsbtRequest::Raw { raw } => format!("funded:raw:{}", raw.inputs.len()),
        };
        Ok(FundVirtualPsbtResponse {
            funded_psbt,
            change_output_index: 1,
            passive_asset_psbts: vec!["passive".to_string()],
        })
    }

    async fn sign_virtual_psbt(&self, funded_psbt: &str) -> Result<SignVirtualPsbtResponse, Error> {
        self.record("sign_virtual_psbt");
        let slots = SignatureSlots::new(&self.sigs_dir);
        let signature = match fs::read_to_string(self.sigs_dir.join("signature.hex")).await {
            Ok(signature) => signature,
            Err(_) => {
                let deposit = self.state().deposit_sighash;
                if deposit {
                    slots
                        .write_challenge(&mock_sighash(funded_psbt))
                        .await
                        .map_err(|e| Error::Unexpected(e.to_string()))?;
                }
                // leave room for another request to interleave
                sleep(Duration::from_millis(5)).await;
                return Err(rpc_error("tapd", "no signature override found"));
            }
        };
        let sighash = slots
            .read_challenge()
            .await
            .map_err(|e| Error::Unexpected(e.to_string()))?
            .unwrap_or_default();
        if sighash != mock_sighash(funded_psbt) {
            return Err(rpc_error("tapd", "sighash does not match PSBT"));
        }
        if !verify_signature(&sighash, &signature) {
            return Err(rpc_error("tapd", "invalid signature"));
        }
        Ok(SignVirtualPsbtResponse {
            signed_psbt: format!("signed:{}:{}", funded_psbt, signature),
            signed_inputs: vec![0],
        })
    }

    async fn prepare_anchoring_template(
        &self,
        request: &PrepareAnchoringTemplateRequest,
    ) -> Result<PrepareAnchoringTemplateResponse, Error> {
        self.record("prepare_anchoring_template");
        Ok(PrepareAnchoringTemplateResponse {
            anchor_psbt: format!("prepared:{}", request.output_amt),
        })
    }

    async fn commit_virtual_psbts(
        &self,
        request: &CommitVirtualPsbtsRequest,
    ) -> Result<CommitVirtualPsbtsResponse, Error> {
        self.record("commit_virtual_psbts");
        let mut state = self.state();
        state.commit_requests.push(serde_json::to_value(request)?);
        if state.fail_commit {
            return Err(rpc_error("tapd", "insufficient funds"));
        }
        Ok(CommitVirtualPsbtsResponse {
            anchor_psbt: state.commit_anchor_psbt.clone(),
            virtual_psbts: request
                .virtual_psbts
                .iter()
                .map(|p| format!("committed:{}", p))
                .collect(),
            passive_asset_psbts: vec![],
            change_output_index: 1,
            lnd_locked_utxos: state.locked_utxos.clone(),
        })
    }

    async fn update_virtual_psbt(
        &self,
        request: &UpdateVirtualPsbtRequest,
    ) -> Result<UpdateVirtualPsbtResponse, Error> {
        self.record("update_virtual_psbt");
        Ok(UpdateVirtualPsbtResponse {
            updated_virtual_psbt: format!("updated:{}:{}", request.virtual_psbt, request.script_key),
            updated_anchor_psbt: format!("updated:{}", request.anchor_psbt),
        })
    }

    async fn anchor_virtual_psbts(&self, virtual_psbts: Vec<String>) -> Result<AssetTransfer, Error> {
        self.record("anchor_virtual_psbts");
        Ok(AssetTransfer {
            anchor_tx_hash: format!("anchored:{}", virtual_psbts.join(",")),
            outputs: vec![TransferOutput {
                anchor: TransferAnchor {
                    outpoint: outpoint(9).to_string(),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    async fn decode_addr(&self, addr: &str) -> Result<TapAddress, Error> {
        self.record("decode_addr");
        if !addr.starts_with("taprt1") {
            return Err(rpc_error("tapd", "invalid address"));
        }
        Ok(TapAddress {
            encoded: addr.to_string(),
            ..self.state().decoded.clone()
        })
    }

    async fn new_addr(&self, request: &NewAddrRequest) -> Result<TapAddress, Error> {
        self.record("new_addr");
        Ok(TapAddress {
            encoded: format!("taprt1{}", request.asset_id),
            asset_id: request.asset_id.clone(),
            amount: request.amt.to_string(),
            script_key: request.script_key.key_desc.raw_key_bytes.clone(),
            internal_key: request.internal_key.raw_key_bytes.clone(),
        })
    }

    async fn list_transfers(&self) -> Result<ListTransfersResponse, Error> {
        self.record("list_transfers");
        Ok(ListTransfersResponse {
            transfers: self.state().transfers.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct WalletState {
    pub fail_sign: bool,
    pub sign_delay: Duration,
    pub signed: Vec<String>,
    pub finalized: Vec<String>,
    pub released: Vec<(String, Outpoint)>,
}

/// In-process wallet daemon: signing and finalizing return the PSBT
/// unchanged after checking it decodes.
#[derive(Clone, Debug, Default)]
pub struct MockWalletDaemon {
    state: Arc<Mutex<WalletState>>,
}

impl MockWalletDaemon {
    pub fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().expect("mock state")
    }
}

fn check_psbt(psbt_base64: &str) -> Result<(), Error> {
    let bytes = BASE64_STANDARD.decode(psbt_base64)?;
    Psbt::deserialize(&bytes).map_err(|e| rpc_error("lnd", e.to_string()))?;
    Ok(())
}

impl WalletDaemon for MockWalletDaemon {
    async fn next_internal_key(&self) -> Result<KeyDescriptor, Error> {
        Ok(KeyDescriptor {
            raw_key_bytes: format!("03{}", other_key()),
            key_loc: KeyLocator {
                key_family: 212,
                key_index: 7,
            },
        })
    }

    async fn sign_psbt(&self, psbt_base64: &str) -> Result<SignPsbtResponse, Error> {
        let delay = self.state().sign_delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if self.state().fail_sign {
            return Err(rpc_error("lnd", "wallet locked"));
        }
        check_psbt(psbt_base64)?;
        self.state().signed.push(psbt_base64.to_string());
        Ok(SignPsbtResponse {
            signed_psbt: psbt_base64.to_string(),
            signed_inputs: vec![1],
        })
    }

    async fn finalize_psbt(&self, psbt_base64: &str) -> Result<FinalizePsbtResponse, Error> {
        check_psbt(psbt_base64)?;
        self.state().finalized.push(psbt_base64.to_string());
        Ok(FinalizePsbtResponse {
            signed_psbt: psbt_base64.to_string(),
            raw_final_tx: String::new(),
        })
    }

    async fn release_output(&self, lease_id: &str, outpoint: &Outpoint) -> Result<(), Error> {
        self.state()
            .released
            .push((lease_id.to_string(), outpoint.clone()));
        Ok(())
    }
}

pub type MockSwapper = Swapper<MockAssetDaemon, MockWalletDaemon>;

/// Swapper over fresh mock daemons, with its order ledger and signature
/// slots under `dir`.
pub fn mock_swapper(dir: &Path) -> Result<(MockSwapper, MockAssetDaemon, MockWalletDaemon), anyhow::Error> {
    let sigs_dir = dir.join("sigs");
    let assets = MockAssetDaemon::new(&sigs_dir);
    let wallet = MockWalletDaemon::default();
    let signing = SigningChannel::new(SignatureSlots::new(&sigs_dir), Duration::from_secs(60));
    let orders = OrderStore::new(dir)?;
    let swapper = Swapper::new(
        assets.clone(),
        wallet.clone(),
        Arc::new(signing),
        Arc::new(orders),
        Network::Regtest,
        Some(LEASE_ID.to_string()),
    );
    Ok((swapper, assets, wallet))
}
