pub mod error;
pub mod lnd;
pub mod rest;
pub mod tapd;
pub mod types;

use std::future::Future;

pub use error::Error;
pub use rest::{RestClient, RestConfig};

use types::{
    AssetTransfer, CommitVirtualPsbtsRequest, CommitVirtualPsbtsResponse,
    CreateInteractiveSendTemplateRequest, FinalizePsbtResponse, FundVirtualPsbtRequest,
    FundVirtualPsbtResponse, KeyDescriptor, ListTransfersResponse, ListUtxosResponse,
    NewAddrRequest, Outpoint, PrepareAnchoringTemplateRequest, PrepareAnchoringTemplateResponse,
    SignPsbtResponse, SignVirtualPsbtResponse, TapAddress, UpdateVirtualPsbtRequest,
    UpdateVirtualPsbtResponse, VirtualPsbtTemplate,
};

/// The taproot-asset daemon: owns virtual PSBTs and the asset UTXO set.
pub trait AssetDaemon: Send + Sync + Clone + 'static {
    fn list_utxos(&self) -> impl Future<Output = Result<ListUtxosResponse, Error>> + Send;

    fn create_interactive_send_template(
        &self,
        request: &CreateInteractiveSendTemplateRequest,
    ) -> impl Future<Output = Result<VirtualPsbtTemplate, Error>> + Send;

    fn fund_virtual_psbt(
        &self,
        request: &FundVirtualPsbtRequest,
    ) -> impl Future<Output = Result<FundVirtualPsbtResponse, Error>> + Send;

    /// Signs with the daemon's key, or with an override signature when one
    /// is waiting in the signatures directory.
    fn sign_virtual_psbt(
        &self,
        funded_psbt: &str,
    ) -> impl Future<Output = Result<SignVirtualPsbtResponse, Error>> + Send;

    fn prepare_anchoring_template(
        &self,
        request: &PrepareAnchoringTemplateRequest,
    ) -> impl Future<Output = Result<PrepareAnchoringTemplateResponse, Error>> + Send;

    fn commit_virtual_psbts(
        &self,
        request: &CommitVirtualPsbtsRequest,
    ) -> impl Future<Output = Result<CommitVirtualPsbtsResponse, Error>> + Send;

    fn update_virtual_psbt(
        &self,
        request: &UpdateVirtualPsbtRequest,
    ) -> impl Future<Output = Result<UpdateVirtualPsbtResponse, Error>> + Send;

    fn anchor_virtual_psbts(
        &self,
        virtual_psbts: Vec<String>,
    ) -> impl Future<Output = Result<AssetTransfer, Error>> + Send;

    fn decode_addr(&self, addr: &str) -> impl Future<Output = Result<TapAddress, Error>> + Send;

    fn new_addr(
        &self,
        request: &NewAddrRequest,
    ) -> impl Future<Output = Result<TapAddress, Error>> + Send;

    fn list_transfers(&self) -> impl Future<Output = Result<ListTransfersResponse, Error>> + Send;
}

/// The on-chain wallet daemon: signs and finalizes anchor PSBTs.
pub trait WalletDaemon: Send + Sync + Clone + 'static {
    fn next_internal_key(&self) -> impl Future<Output = Result<KeyDescriptor, Error>> + Send;

    fn sign_psbt(
        &self,
        psbt_base64: &str,
    ) -> impl Future<Output = Result<SignPsbtResponse, Error>> + Send;

    fn finalize_psbt(
        &self,
        psbt_base64: &str,
    ) -> impl Future<Output = Result<FinalizePsbtResponse, Error>> + Send;

    fn release_output(
        &self,
        lease_id: &str,
        outpoint: &Outpoint,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}
