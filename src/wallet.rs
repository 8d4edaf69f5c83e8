use std::collections::BTreeMap;

use bitcoin::secp256k1::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    rpc::{
        AssetDaemon,
        types::{AssetGenesis, AssetTransfer, ListUtxosResponse},
    },
    swap::{SwapError, selector::script_key},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset_genesis: AssetGenesis,
    pub balance: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalances {
    pub asset_balances: BTreeMap<String, AssetBalance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Confirmed,
    Unconfirmed,
}

/// A daemon transfer seen from one caller's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub txid: String,
    pub timestamp: String,
    pub height: u32,
    pub asset_id: String,
    #[serde(rename = "type")]
    pub kind: TransferKind,
    pub amount: u64,
    pub status: TransferStatus,
    /// Amount returned to the caller; only non-zero for sends.
    pub change_amount: u64,
}

/// Per-asset totals owned by `caller`. Assets present in the daemon but not
/// owned by the caller are listed with a zero balance.
pub fn balances(utxos: &ListUtxosResponse, caller: &XOnlyPublicKey) -> WalletBalances {
    let script_key = script_key(caller);
    let mut result = WalletBalances::default();
    for utxo in utxos.managed_utxos.values() {
        for asset in &utxo.assets {
            let amount = if asset.script_key == script_key {
                match asset.amount.parse::<u64>() {
                    Ok(amount) => amount,
                    Err(e) => {
                        warn!("Ignoring invalid amount {} in {}: {}", asset.amount, utxo.out_point, e);
                        0
                    }
                }
            } else {
                0
            };
            result
                .asset_balances
                .entry(asset.asset_genesis.asset_id.clone())
                .or_insert_with(|| AssetBalance {
                    asset_genesis: asset.asset_genesis.clone(),
                    balance: 0,
                })
                .balance += amount;
        }
    }
    result
}

fn sum_owned<'a>(entries: impl Iterator<Item = (&'a str, &'a str)>, script_key: &str) -> u64 {
    entries
        .filter(|(key, _)| *key == script_key)
        .filter_map(|(_, amount)| amount.parse::<u64>().ok())
        .sum()
}

/// Transfers touching `caller`, classified by net direction.
pub fn transfers(records: &[AssetTransfer], caller: &XOnlyPublicKey) -> Vec<Transfer> {
    let script_key = script_key(caller);
    records
        .iter()
        .filter_map(|record| {
            let sent = sum_owned(
                record
                    .inputs
                    .iter()
                    .map(|i| (i.script_key.as_str(), i.amount.as_str())),
                &script_key,
            );
            let received = sum_owned(
                record
                    .outputs
                    .iter()
                    .map(|o| (o.script_key.as_str(), o.amount.as_str())),
                &script_key,
            );
            if sent == 0 && received == 0 {
                return None;
            }

            let (kind, amount, change_amount) = if received > sent {
                (TransferKind::Receive, received - sent, 0)
            } else {
                (TransferKind::Send, sent - received, received)
            };
            let status = if record.anchor_tx_block_hash.hash.is_empty() {
                TransferStatus::Unconfirmed
            } else {
                TransferStatus::Confirmed
            };
            let txid = record
                .outputs
                .first()
                .and_then(|o| o.anchor.outpoint.split(':').next())
                .unwrap_or_default()
                .to_string();

            Some(Transfer {
                txid,
                timestamp: record.transfer_timestamp.clone(),
                height: record.anchor_tx_height_hint,
                asset_id: record
                    .inputs
                    .first()
                    .map(|i| i.asset_id.clone())
                    .unwrap_or_default(),
                kind,
                amount,
                status,
                change_amount,
            })
        })
        .collect()
}

pub async fn fetch_balances<A: AssetDaemon>(
    assets: &A,
    caller: &XOnlyPublicKey,
) -> Result<WalletBalances, SwapError> {
    let utxos = assets
        .list_utxos()
        .await
        .map_err(SwapError::rpc("list asset UTXOs"))?;
    Ok(balances(&utxos, caller))
}

pub async fn fetch_transfers<A: AssetDaemon>(
    assets: &A,
    caller: &XOnlyPublicKey,
) -> Result<Vec<Transfer>, SwapError> {
    let listed = assets
        .list_transfers()
        .await
        .map_err(SwapError::rpc("list asset transfers"))?;
    Ok(transfers(&listed.transfers, caller))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rpc::types::{AnchorBlockHash, TransferAnchor, TransferInput, TransferOutput},
        test_utils::{caller_key, managed_utxos, other_key},
    };

    fn record(inputs: &[(&str, u64)], outputs: &[(&str, u64)], confirmed: bool) -> AssetTransfer {
        AssetTransfer {
            transfer_timestamp: "1700000000".to_string(),
            anchor_tx_height_hint: 812,
            anchor_tx_block_hash: AnchorBlockHash {
                hash: if confirmed { "00ab".to_string() } else { String::new() },
                hash_str: String::new(),
            },
            inputs: inputs
                .iter()
                .map(|(key, amount)| TransferInput {
                    asset_id: "aa11".to_string(),
                    script_key: key.to_string(),
                    amount: amount.to_string(),
                    ..Default::default()
                })
                .collect(),
            outputs: outputs
                .iter()
                .map(|(key, amount)| TransferOutput {
                    anchor: TransferAnchor {
                        outpoint: "f00d:1".to_string(),
                        ..Default::default()
                    },
                    script_key: key.to_string(),
                    amount: amount.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_balances_sum_owned_and_zero_foreign() {
        let caller = caller_key();
        let stranger = other_key();
        let utxos = managed_utxos(&[
            (1, &caller, "aa11", 500),
            (2, &caller, "aa11", 700),
            (3, &stranger, "bb22", 900),
        ]);
        let result = balances(&utxos, &caller);
        assert_eq!(result.asset_balances["aa11"].balance, 1200);
        assert_eq!(result.asset_balances["bb22"].balance, 0);
        assert_eq!(result.asset_balances.len(), 2);
    }

    #[test]
    fn test_transfers_classify_direction() {
        let caller = caller_key();
        let mine = script_key(&caller);
        let mine = mine.as_str();
        let theirs = script_key(&other_key());
        let theirs = theirs.as_str();
        let records = vec![
            record(&[(theirs, 100)], &[(mine, 100)], true),
            record(&[(mine, 100)], &[(theirs, 60), (mine, 40)], false),
            record(&[(theirs, 10)], &[(theirs, 10)], true),
        ];

        let result = transfers(&records, &caller);
        assert_eq!(result.len(), 2);

        assert_eq!(result[0].kind, TransferKind::Receive);
        assert_eq!(result[0].amount, 100);
        assert_eq!(result[0].change_amount, 0);
        assert_eq!(result[0].status, TransferStatus::Confirmed);
        assert_eq!(result[0].txid, "f00d");
        assert_eq!(result[0].asset_id, "aa11");
        assert_eq!(result[0].height, 812);

        assert_eq!(result[1].kind, TransferKind::Send);
        assert_eq!(result[1].amount, 60);
        assert_eq!(result[1].change_amount, 40);
        assert_eq!(result[1].status, TransferStatus::Unconfirmed);
    }

    #[test]
    fn test_transfer_serializes_type_field() {
        let caller = caller_key();
        let mine = script_key(&caller);
        let result = transfers(&[record(&[], &[(mine.as_str(), 5)], false)], &caller);
        let value = serde_json::to_value(&result[0]).unwrap();
        assert_eq!(value["type"], "receive");
        assert_eq!(value["status"], "unconfirmed");
        assert_eq!(value["asset_id"], "");
    }
}
