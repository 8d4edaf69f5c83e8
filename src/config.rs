use std::{net::IpAddr, path::PathBuf, time::Duration};

use bitcoin::Network;
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::logging;

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[clap(
    author = "Tajfi",
    version = "0.1.0",
    about = "Tajfi",
    long_about = r#"Non-custodial taproot asset swaps against on-chain bitcoin"#
)]
pub struct Config {
    #[clap(
        long,
        env = "LOG_FORMAT",
        help = "Log format (plain, json)",
        default_value = "plain"
    )]
    pub log_format: logging::Format,

    #[clap(
        long,
        env = "API_HOST",
        help = "Address the API server binds to",
        default_value = "127.0.0.1"
    )]
    pub api_host: IpAddr,

    #[clap(
        long,
        env = "API_PORT",
        help = "Port number for the API server (e.g., 18881)",
        default_value = "18881"
    )]
    pub api_port: u16,

    #[clap(
        long,
        env = "DATA_DIR",
        help = "Directory path for orders and optional cert.pem/key.pem"
    )]
    pub data_dir: PathBuf,

    #[clap(
        long,
        env = "TAPD_URL",
        help = "Base URL of the taproot assets daemon REST endpoint (e.g., https://localhost:8089)"
    )]
    pub tapd_url: String,

    #[clap(long, env = "TAPD_MACAROON", help = "Hex encoded tapd macaroon")]
    pub tapd_macaroon: String,

    #[clap(
        long,
        env = "TAPD_ACCEPT_INVALID_CERTS",
        help = "Accept self-signed certificates from tapd",
        default_value = "false"
    )]
    pub tapd_accept_invalid_certs: bool,

    #[clap(
        long,
        env = "LND_URL",
        help = "Base URL of the lnd REST endpoint (e.g., https://localhost:8080)"
    )]
    pub lnd_url: String,

    #[clap(long, env = "LND_MACAROON", help = "Hex encoded lnd macaroon")]
    pub lnd_macaroon: String,

    #[clap(
        long,
        env = "LND_ACCEPT_INVALID_CERTS",
        help = "Accept self-signed certificates from lnd",
        default_value = "false"
    )]
    pub lnd_accept_invalid_certs: bool,

    #[clap(
        long,
        env = "LND_LEASE_ID",
        help = "Hex lease id used by tapd when locking wallet UTXOs; enables automatic release on failed swaps"
    )]
    pub lnd_lease_id: Option<String>,

    #[clap(
        long,
        env = "TAPROOT_SIGS_DIR",
        help = "Directory where tapd exchanges sighash.hex and signature.hex"
    )]
    pub taproot_sigs_dir: PathBuf,

    #[clap(
        long,
        env = "NETWORK",
        help = "Network payout addresses must belong to",
        default_value = "signet"
    )]
    pub network: Network,

    #[clap(
        long,
        env = "RPC_TIMEOUT_SECS",
        help = "Deadline for each daemon RPC",
        default_value = "30"
    )]
    pub rpc_timeout_secs: u64,

    #[clap(
        long,
        env = "REQUEST_TIMEOUT_SECS",
        help = "Deadline for a whole API request",
        default_value = "120"
    )]
    pub request_timeout_secs: u64,

    #[clap(
        long,
        env = "SIGNING_SESSION_TTL_SECS",
        help = "How long an issued sighash stays redeemable",
        default_value = "600"
    )]
    pub signing_session_ttl_secs: u64,
}

impl Config {
    pub fn new_na() -> Self {
        let na = "n/a".to_string();
        Self {
            log_format: logging::Format::Plain,
            api_host: [127, 0, 0, 1].into(),
            api_port: 0,
            data_dir: "will be set".into(),
            tapd_url: na.clone(),
            tapd_macaroon: na.clone(),
            tapd_accept_invalid_certs: false,
            lnd_url: na.clone(),
            lnd_macaroon: na,
            lnd_accept_invalid_certs: false,
            lnd_lease_id: None,
            taproot_sigs_dir: "will be set".into(),
            network: Network::Regtest,
            rpc_timeout_secs: 30,
            request_timeout_secs: 120,
            signing_session_ttl_secs: 600,
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn signing_session_ttl(&self) -> Duration {
        Duration::from_secs(self.signing_session_ttl_secs)
    }

    pub fn should_use_tls(&self) -> bool {
        let cert_path = self.data_dir.join("cert.pem");
        let key_path = self.data_dir.join("key.pem");
        cert_path.exists() && key_path.exists()
    }
}
