pub mod buy;
pub mod error;
pub mod orders;
pub mod receive;
pub mod selector;
pub mod sell;
pub mod send;
pub mod signing;
pub mod surgeon;

use std::sync::Arc;

use bitcoin::Network;
use tokio::task;
use tracing::{info, warn};

pub use error::SwapError;
pub use orders::{Order, OrderError, OrderStore};
pub use signing::{SignatureSlots, SigningChannel};

use crate::rpc::{AssetDaemon, WalletDaemon, types::Outpoint};

/// Confirmation target handed to the asset daemon when committing anchors.
pub const TARGET_CONF: u32 = 6;

/// Drives the swap flows against the two daemons.
#[derive(Clone, Debug)]
pub struct Swapper<A: AssetDaemon, W: WalletDaemon> {
    assets: A,
    wallet: W,
    signing: Arc<SigningChannel>,
    orders: Arc<OrderStore>,
    network: Network,
    lease_id: Option<String>,
}

impl<A: AssetDaemon, W: WalletDaemon> Swapper<A, W> {
    pub fn new(
        assets: A,
        wallet: W,
        signing: Arc<SigningChannel>,
        orders: Arc<OrderStore>,
        network: Network,
        lease_id: Option<String>,
    ) -> Self {
        Self {
            assets,
            wallet,
            signing,
            orders,
            network,
            lease_id,
        }
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn orders(&self) -> &OrderStore {
        &self.orders
    }

    /// Hands back wallet UTXOs a failed commit left locked.
    async fn release_locked(&self, locked: &[Outpoint]) {
        if locked.is_empty() {
            return;
        }
        let Some(lease_id) = &self.lease_id else {
            for outpoint in locked {
                warn!("UTXO {} stays locked until released manually", outpoint);
            }
            return;
        };
        for outpoint in locked {
            match self.wallet.release_output(lease_id, outpoint).await {
                Ok(()) => info!("Released locked UTXO {}", outpoint),
                Err(e) => warn!("Failed to release locked UTXO {}: {}", outpoint, e),
            }
        }
    }

    /// Runs a ledger operation on the blocking pool.
    async fn ledger<T, F>(&self, op: F) -> Result<T, SwapError>
    where
        T: Send + 'static,
        F: FnOnce(&OrderStore) -> Result<T, OrderError> + Send + 'static,
    {
        let orders = self.orders.clone();
        Ok(task::spawn_blocking(move || op(orders.as_ref())).await??)
    }

    /// Runs the post-commit steps of a flow on their own task, releasing the
    /// commit's locked UTXOs if any of them fails. The task outlives the
    /// caller: a dropped request still finishes or compensates.
    async fn after_commit<T, F, Fut>(
        &self,
        locked: Vec<Outpoint>,
        steps: F,
    ) -> Result<T, SwapError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T, SwapError>> + Send + 'static,
    {
        let swapper = self.clone();
        let steps = steps(self.clone());
        task::spawn(async move {
            let result = steps.await;
            if let Err(e) = &result {
                warn!("Swap failed after commit: {}", e);
                swapper.release_locked(&locked).await;
            }
            result
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::test_utils::{mock_swapper, outpoint};

    #[tokio::test(flavor = "current_thread")]
    async fn test_ledger_runs_on_blocking_pool() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (swapper, _, _) = mock_swapper(dir.path())?;
        let order = Order::builder()
            .asset_id("ab".to_string())
            .amount_to_sell(10)
            .outpoint(outpoint(3).into())
            .build();

        let on_runtime = std::thread::current().id();
        let worker = swapper
            .ledger(move |orders| {
                orders.write_pending(&order)?;
                Ok(std::thread::current().id())
            })
            .await?;
        assert_ne!(worker, on_runtime);
        assert_eq!(swapper.orders().read_pending(&outpoint(3))?.amount_to_sell, 10);

        let missing = swapper
            .ledger(|orders| orders.read_pending(&outpoint(4)))
            .await;
        assert!(matches!(
            missing,
            Err(SwapError::Order(OrderError::NotFound(_)))
        ));
        Ok(())
    }
}
