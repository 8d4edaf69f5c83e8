use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    rpc::{AssetDaemon, WalletDaemon},
    swap::Swapper,
};

#[derive(Clone)]
pub struct Env<A: AssetDaemon, W: WalletDaemon> {
    pub config: Config,
    pub cancel_token: CancellationToken,
    pub swapper: Swapper<A, W>,
}
