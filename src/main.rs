use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tajfi::{
    api::{self, Env},
    config::Config,
    logging,
    rpc::{lnd, tapd},
    stopper,
    swap::{OrderStore, SignatureSlots, SigningChannel, Swapper},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::try_parse()?;
    logging::setup(config.log_format);
    info!("Tajfi");
    info!(
        "Network {}, data dir {}, signatures dir {}",
        config.network,
        config.data_dir.display(),
        config.taproot_sigs_dir.display()
    );
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let assets = tapd::Client::new_from_config(&config)?;
    let wallet = lnd::Client::new_from_config(&config)?;

    let orders = OrderStore::new(&config.data_dir)?;
    orders.recover()?;
    info!("{} completed orders on record", orders.list_final()?.len());

    let signing = SigningChannel::new(
        SignatureSlots::new(&config.taproot_sigs_dir),
        config.signing_session_ttl(),
    );
    let swapper = Swapper::new(
        assets,
        wallet,
        Arc::new(signing),
        Arc::new(orders),
        config.network,
        config.lnd_lease_id.clone(),
    );

    let cancel_token = CancellationToken::new();
    let stopper_handle = stopper::run(cancel_token.clone());
    let api_handle = api::run(Env {
        config,
        cancel_token: cancel_token.clone(),
        swapper,
    })
    .await?;

    api_handle.await?;
    cancel_token.cancel();
    stopper_handle.await?;
    info!("Exited");
    Ok(())
}
