pub mod env;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod result;
pub mod router;

use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use axum_server::{Handle, tls_rustls::RustlsConfig};
pub use env::Env;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::rpc::{AssetDaemon, WalletDaemon};

pub async fn run<A: AssetDaemon, W: WalletDaemon>(env: Env<A, W>) -> Result<JoinHandle<()>> {
    let addr = SocketAddr::from((env.config.api_host, env.config.api_port));
    let tls = if env.config.should_use_tls() {
        Some(
            RustlsConfig::from_pem_file(
                env.config.data_dir.join("cert.pem"),
                env.config.data_dir.join("key.pem"),
            )
            .await?,
        )
    } else {
        None
    };
    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let cancel_token = env.cancel_token.clone();
        async move {
            cancel_token.cancelled().await;
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });
    let scheme = if tls.is_some() { "https" } else { "http" };
    info!("Server running @ {}://{}", scheme, addr);
    let app = router::new(env).into_make_service();
    Ok(tokio::spawn(async move {
        let served = match tls {
            Some(config) => {
                axum_server::bind_rustls(addr, config)
                    .handle(handle)
                    .serve(app)
                    .await
            }
            None => axum_server::bind(addr).handle(handle).serve(app).await,
        };
        if let Err(e) = served {
            error!("Server failed: {}", e);
        }

        info!("Exited");
    }))
}
