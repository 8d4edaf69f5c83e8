use std::str::FromStr;

use bitcoin::{OutPoint, secp256k1::XOnlyPublicKey};
use tracing::warn;

use crate::rpc::types::{ListUtxosResponse, PrevId};

use super::error::SwapError;

/// An asset-bearing UTXO the caller controls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedUtxo {
    pub outpoint: OutPoint,
    pub asset_id: String,
    pub script_key: String,
    pub amount: u64,
    pub internal_key: String,
}

impl OwnedUtxo {
    pub fn prev_id(&self) -> PrevId {
        PrevId {
            outpoint: self.outpoint.into(),
            id: self.asset_id.clone(),
            script_key: self.script_key.clone(),
        }
    }
}

/// Script key the asset daemon reports for outputs owned by `caller`: the
/// even-parity prefix followed by the x-only key.
pub fn script_key(caller: &XOnlyPublicKey) -> String {
    format!("02{}", caller)
}

/// Caller-owned UTXOs of `asset_id`, largest first. Equal amounts are ordered
/// by outpoint so the result does not depend on the daemon's map ordering.
pub fn select_owned(
    utxos: &ListUtxosResponse,
    caller: &XOnlyPublicKey,
    asset_id: &str,
) -> Vec<OwnedUtxo> {
    let script_key = script_key(caller);
    let mut owned = Vec::new();
    for utxo in utxos.managed_utxos.values() {
        let Some(asset) = utxo
            .assets
            .iter()
            .find(|a| a.script_key == script_key && a.asset_genesis.asset_id == asset_id)
        else {
            continue;
        };
        let outpoint = match OutPoint::from_str(&utxo.out_point) {
            Ok(outpoint) => outpoint,
            Err(e) => {
                warn!("Skipping UTXO with unparsable outpoint {}: {}", utxo.out_point, e);
                continue;
            }
        };
        let amount = match asset.amount.parse::<u64>() {
            Ok(amount) => amount,
            Err(e) => {
                warn!("Skipping UTXO {} with invalid amount {}: {}", outpoint, asset.amount, e);
                continue;
            }
        };
        owned.push(OwnedUtxo {
            outpoint,
            asset_id: asset.asset_genesis.asset_id.clone(),
            script_key: asset.script_key.clone(),
            amount,
            internal_key: utxo.internal_key.clone(),
        });
    }
    owned.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.outpoint.cmp(&b.outpoint))
    });
    owned
}

/// Picks the first UTXO in `owned` holding exactly `amount`. No splitting is
/// attempted; on failure every owned amount is reported, ascending.
pub fn select_exact(owned: &[OwnedUtxo], asset_id: &str, amount: u64) -> Result<OwnedUtxo, SwapError> {
    if let Some(utxo) = owned.iter().find(|utxo| utxo.amount == amount) {
        return Ok(utxo.clone());
    }
    let mut available: Vec<u64> = owned.iter().map(|utxo| utxo.amount).collect();
    available.sort_unstable();
    Err(SwapError::NoEligibleUtxo {
        asset_id: asset_id.to_string(),
        requested: amount,
        available,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::test_utils::{caller_key, managed_utxos, other_key};

    const ASSET: &str = "aa11";

    #[test]
    fn test_select_exact_picks_lowest_outpoint_among_ties() {
        let caller = caller_key();
        let utxos = managed_utxos(&[
            (1, &caller, ASSET, 500),
            (3, &caller, ASSET, 1200),
            (2, &caller, ASSET, 1200),
        ]);
        let owned = select_owned(&utxos, &caller, ASSET);
        assert_eq!(
            owned.iter().map(|u| u.amount).collect::<Vec<_>>(),
            vec![1200, 1200, 500]
        );

        let picked = select_exact(&owned, ASSET, 1200).unwrap();
        assert_eq!(picked.amount, 1200);
        assert_eq!(picked.outpoint, owned[0].outpoint);
        assert!(owned[0].outpoint < owned[1].outpoint);

        // the same answer regardless of how often the daemon reshuffles its map
        for _ in 0..10 {
            let again = select_owned(&utxos.clone(), &caller, ASSET);
            assert_eq!(select_exact(&again, ASSET, 1200).unwrap(), picked);
        }
    }

    #[test]
    fn test_select_exact_reports_available_amounts() {
        let caller = caller_key();
        let utxos = managed_utxos(&[
            (1, &caller, ASSET, 1200),
            (2, &caller, ASSET, 500),
            (3, &caller, ASSET, 1200),
        ]);
        let owned = select_owned(&utxos, &caller, ASSET);
        match select_exact(&owned, ASSET, 900) {
            Err(SwapError::NoEligibleUtxo {
                asset_id,
                requested,
                available,
            }) => {
                assert_eq!(asset_id, ASSET);
                assert_eq!(requested, 900);
                assert_eq!(available, vec![500, 1200, 1200]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_select_owned_filters_foreign_and_other_assets() {
        let caller = caller_key();
        let stranger = other_key();
        let utxos = managed_utxos(&[
            (1, &caller, ASSET, 10),
            (2, &stranger, ASSET, 20),
            (3, &caller, "bb22", 30),
        ]);
        let owned = select_owned(&utxos, &caller, ASSET);
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].amount, 10);
        assert_eq!(owned[0].script_key, script_key(&caller));
        assert_eq!(owned[0].internal_key, "internal-1");
    }

    #[test]
    fn test_select_owned_skips_malformed_records() {
        let caller = caller_key();
        let mut utxos = managed_utxos(&[(1, &caller, ASSET, 10), (2, &caller, ASSET, 20)]);
        for utxo in utxos.managed_utxos.values_mut() {
            if utxo.assets[0].amount == "20" {
                utxo.assets[0].amount = "twenty".to_string();
            } else {
                utxo.out_point = "not-an-outpoint".to_string();
            }
        }
        assert!(select_owned(&utxos, &caller, ASSET).is_empty());
    }

    proptest! {
        #[test]
        fn prop_select_exact_matches_iff_amount_present(
            entries in prop::collection::vec((any::<bool>(), any::<bool>(), 1u64..6), 0..12),
            target in 1u64..6,
        ) {
            let caller = caller_key();
            let stranger = other_key();
            let spec: Vec<_> = entries
                .iter()
                .enumerate()
                .map(|(i, (mine, same_asset, amount))| {
                    (
                        i as u32 + 1,
                        if *mine { &caller } else { &stranger },
                        if *same_asset { ASSET } else { "bb22" },
                        *amount,
                    )
                })
                .collect();
            let utxos = managed_utxos(&spec);
            let owned = select_owned(&utxos, &caller, ASSET);

            let mut expected: Vec<u64> = entries
                .iter()
                .filter(|(mine, same_asset, _)| *mine && *same_asset)
                .map(|(_, _, amount)| *amount)
                .collect();
            expected.sort_unstable();

            match select_exact(&owned, ASSET, target) {
                Ok(utxo) => {
                    prop_assert_eq!(utxo.amount, target);
                    prop_assert!(expected.contains(&target));
                }
                Err(SwapError::NoEligibleUtxo { available, .. }) => {
                    prop_assert!(!expected.contains(&target));
                    prop_assert_eq!(available, expected);
                }
                Err(e) => prop_assert!(false, "unexpected error {}", e),
            }
        }
    }
}
