use bitcoin::{
    PublicKey,
    secp256k1::{Parity, XOnlyPublicKey},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rpc::{
    AssetDaemon, WalletDaemon,
    types::{NewAddrRequest, RawKey, ScriptKeyDescriptor, TapAddress},
};

use super::{SwapError, Swapper, sell::require};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub asset_id: String,
    pub amt: u64,
}

/// Compressed form of an x-only key, taking the even-y point.
pub fn compress(key: &XOnlyPublicKey) -> String {
    PublicKey::new(key.public_key(Parity::Even)).to_string()
}

impl<A: AssetDaemon, W: WalletDaemon> Swapper<A, W> {
    /// Issues a taproot-asset address paying `amt` of the asset to the
    /// caller's key, anchored under a fresh wallet internal key.
    pub async fn receive(
        &self,
        caller: &XOnlyPublicKey,
        request: ReceiveRequest,
    ) -> Result<TapAddress, SwapError> {
        require("asset_id", &request.asset_id)?;
        if request.amt == 0 {
            return Err(SwapError::InvalidRequest("amt must be positive".to_string()));
        }

        let internal_key = self
            .wallet
            .next_internal_key()
            .await
            .map_err(SwapError::rpc("derive internal key"))?;

        let address = self
            .assets
            .new_addr(&NewAddrRequest {
                asset_id: request.asset_id,
                amt: request.amt,
                script_key: ScriptKeyDescriptor {
                    pub_key: caller.to_string(),
                    key_desc: RawKey {
                        raw_key_bytes: compress(caller),
                    },
                },
                internal_key,
            })
            .await
            .map_err(SwapError::rpc("create address"))?;
        info!("Issued address {} to {}", address.encoded, caller);
        Ok(address)
    }
}
