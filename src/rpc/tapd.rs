use crate::config::Config;

use super::{
    AssetDaemon,
    error::Error,
    rest::{RestClient, RestConfig},
    types::{
        AnchorVirtualPsbtsRequest, AssetTransfer, CommitVirtualPsbtsRequest,
        CommitVirtualPsbtsResponse, CreateInteractiveSendTemplateRequest, DecodeAddrRequest,
        FundVirtualPsbtRequest, FundVirtualPsbtResponse, ListTransfersResponse,
        ListUtxosResponse, NewAddrRequest, PrepareAnchoringTemplateRequest,
        PrepareAnchoringTemplateResponse, SignVirtualPsbtRequest, SignVirtualPsbtResponse,
        TapAddress, UpdateVirtualPsbtRequest, UpdateVirtualPsbtResponse, VirtualPsbtTemplate,
    },
};

const VIRTUAL_PSBT: &str = "/v1/taproot-assets/wallet/virtual-psbt";

#[derive(Clone, Debug)]
pub struct Client {
    rest: RestClient,
}

impl Client {
    pub fn new(config: RestConfig) -> Result<Self, Error> {
        Ok(Client {
            rest: RestClient::new("tapd", config)?,
        })
    }

    pub fn new_from_config(config: &Config) -> Result<Self, Error> {
        Client::new(RestConfig {
            url: config.tapd_url.to_owned(),
            macaroon: config.tapd_macaroon.to_owned(),
            accept_invalid_certs: config.tapd_accept_invalid_certs,
            timeout: config.rpc_timeout(),
        })
    }
}

impl AssetDaemon for Client {
    async fn list_utxos(&self) -> Result<ListUtxosResponse, Error> {
        self.rest.get("/v1/taproot-assets/assets/utxos").await
    }

    async fn create_interactive_send_template(
        &self,
        request: &CreateInteractiveSendTemplateRequest,
    ) -> Result<VirtualPsbtTemplate, Error> {
        self.rest
            .post(
                &format!("{}/create-interactive-send-template", VIRTUAL_PSBT),
                request,
            )
            .await
    }

    async fn fund_virtual_psbt(
        &self,
        request: &FundVirtualPsbtRequest,
    ) -> Result<FundVirtualPsbtResponse, Error> {
        self.rest
            .post(&format!("{}/fund", VIRTUAL_PSBT), request)
            .await
    }

    async fn sign_virtual_psbt(&self, funded_psbt: &str) -> Result<SignVirtualPsbtResponse, Error> {
        self.rest
            .post(
                &format!("{}/sign", VIRTUAL_PSBT),
                &SignVirtualPsbtRequest { funded_psbt },
            )
            .await
    }

    async fn prepare_anchoring_template(
        &self,
        request: &PrepareAnchoringTemplateRequest,
    ) -> Result<PrepareAnchoringTemplateResponse, Error> {
        self.rest
            .post(
                &format!("{}/prepare-anchoring-template", VIRTUAL_PSBT),
                request,
            )
            .await
    }

    async fn commit_virtual_psbts(
        &self,
        request: &CommitVirtualPsbtsRequest,
    ) -> Result<CommitVirtualPsbtsResponse, Error> {
        self.rest
            .post(&format!("{}/commit", VIRTUAL_PSBT), request)
            .await
    }

    async fn update_virtual_psbt(
        &self,
        request: &UpdateVirtualPsbtRequest,
    ) -> Result<UpdateVirtualPsbtResponse, Error> {
        self.rest
            .post(&format!("{}/update", VIRTUAL_PSBT), request)
            .await
    }

    async fn anchor_virtual_psbts(&self, virtual_psbts: Vec<String>) -> Result<AssetTransfer, Error> {
        self.rest
            .post(
                &format!("{}/anchor", VIRTUAL_PSBT),
                &AnchorVirtualPsbtsRequest { virtual_psbts },
            )
            .await
    }

    async fn decode_addr(&self, addr: &str) -> Result<TapAddress, Error> {
        self.rest
            .post("/v1/taproot-assets/addrs/decode", &DecodeAddrRequest { addr })
            .await
    }

    async fn new_addr(&self, request: &NewAddrRequest) -> Result<TapAddress, Error> {
        self.rest.post("/v1/taproot-assets/addrs", request).await
    }

    async fn list_transfers(&self) -> Result<ListTransfersResponse, Error> {
        self.rest.get("/v1/taproot-assets/assets/transfers").await
    }
}
