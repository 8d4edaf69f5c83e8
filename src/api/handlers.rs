use axum::{extract::State, http::Uri};

use crate::{
    rpc::{
        AssetDaemon, WalletDaemon,
        types::{AssetTransfer, TapAddress, UpdateVirtualPsbtResponse},
    },
    swap::{
        buy::{BuyCompleteRequest, BuyCompleteResponse, BuyStartRequest},
        receive::ReceiveRequest,
        sell::{SellCompleteRequest, SellCompleteResponse, SellStartRequest, SellStartResponse},
        send::{DecodeAddressRequest, SendCompleteRequest, SendStartRequest, SendStartResponse},
    },
    wallet::{self, Transfer, WalletBalances},
};

use super::{
    Env,
    error::{Error, HttpError},
    extract::{CallerKey, Payload},
    result::Result,
};

pub async fn get_health() -> Result<&'static str> {
    Ok("OK".into())
}

pub async fn not_found(uri: Uri) -> Error {
    HttpError::NotFound(uri.path().to_string()).into()
}

pub async fn post_sell_start<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    CallerKey(caller): CallerKey,
    Payload(request): Payload<SellStartRequest>,
) -> Result<SellStartResponse> {
    Ok(env.swapper.sell_start(&caller, request).await?.into())
}

pub async fn post_sell_complete<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    Payload(request): Payload<SellCompleteRequest>,
) -> Result<SellCompleteResponse> {
    Ok(env.swapper.sell_complete(request).await?.into())
}

pub async fn post_buy_start<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    CallerKey(caller): CallerKey,
    Payload(request): Payload<BuyStartRequest>,
) -> Result<UpdateVirtualPsbtResponse> {
    Ok(env.swapper.buy_start(&caller, request).await?.into())
}

pub async fn post_buy_complete<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    Payload(request): Payload<BuyCompleteRequest>,
) -> Result<BuyCompleteResponse> {
    Ok(env.swapper.buy_complete(request).await?.into())
}

pub async fn post_send_decode<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    Payload(request): Payload<DecodeAddressRequest>,
) -> Result<TapAddress> {
    Ok(env.swapper.decode_address(request).await?.into())
}

pub async fn post_send_start<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    CallerKey(caller): CallerKey,
    Payload(request): Payload<SendStartRequest>,
) -> Result<SendStartResponse> {
    Ok(env.swapper.send_start(&caller, request).await?.into())
}

pub async fn post_send_complete<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    Payload(request): Payload<SendCompleteRequest>,
) -> Result<AssetTransfer> {
    Ok(env.swapper.send_complete(request).await?.into())
}

pub async fn post_receive<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    CallerKey(caller): CallerKey,
    Payload(request): Payload<ReceiveRequest>,
) -> Result<TapAddress> {
    Ok(env.swapper.receive(&caller, request).await?.into())
}

pub async fn get_balances<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    CallerKey(caller): CallerKey,
) -> Result<WalletBalances> {
    Ok(wallet::fetch_balances(env.swapper.assets(), &caller)
        .await?
        .into())
}

pub async fn get_transfers<A: AssetDaemon, W: WalletDaemon>(
    State(env): State<Env<A, W>>,
    CallerKey(caller): CallerKey,
) -> Result<Vec<Transfer>> {
    Ok(wallet::fetch_transfers(env.swapper.assets(), &caller)
        .await?
        .into())
}
