use anyhow::Result;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{Value, json};
use tajfi::{
    api::{Env, extract::CALLER_KEY_HEADER, router},
    config::Config,
    test_utils::{
        MockAssetDaemon, MockWalletDaemon, anchor_psbt_hex, caller_key, managed_utxos,
        mock_signature, mock_swapper, other_key,
    },
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const ASSET: &str = "cdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd";

struct TestApp {
    server: TestServer,
    assets: MockAssetDaemon,
    wallet: MockWalletDaemon,
    _dir: TempDir,
}

fn create_test_app() -> Result<TestApp> {
    let dir = tempfile::tempdir()?;
    let (swapper, assets, wallet) = mock_swapper(dir.path())?;
    let mut config = Config::new_na();
    config.data_dir = dir.path().to_path_buf();
    config.taproot_sigs_dir = dir.path().join("sigs");
    let env = Env {
        config,
        cancel_token: CancellationToken::new(),
        swapper,
    };
    Ok(TestApp {
        server: TestServer::new(router::new(env))?,
        assets,
        wallet,
        _dir: dir,
    })
}

fn caller_header() -> Result<(HeaderName, HeaderValue)> {
    Ok((
        HeaderName::from_static(CALLER_KEY_HEADER),
        HeaderValue::from_str(&caller_key().to_string())?,
    ))
}

fn error_message(response: &TestResponse) -> String {
    let body: Value = response.json();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let app = create_test_app()?;

    let response = app.server.get("/api/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "result": "OK" }));
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_route() -> Result<()> {
    let app = create_test_app()?;

    let response = app.server.get("/api/wallet/unknown").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(error_message(&response).contains("/api/wallet/unknown"));
    Ok(())
}

#[tokio::test]
async fn test_missing_caller_key_is_unauthorized() -> Result<()> {
    let app = create_test_app()?;

    let response = app.server.get("/api/wallet/balances").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(error_message(&response).contains(CALLER_KEY_HEADER));

    let response = app
        .server
        .post("/api/wallet/sell/start")
        .add_header(
            HeaderName::from_static(CALLER_KEY_HEADER),
            HeaderValue::from_static("not-a-key"),
        )
        .json(&json!({ "asset_id": ASSET, "amount_to_sell": 10 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(app.assets.state().calls.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() -> Result<()> {
    let app = create_test_app()?;
    let (name, value) = caller_header()?;

    let response = app
        .server
        .post("/api/wallet/sell/start")
        .add_header(name.clone(), value.clone())
        .json(&json!({ "asset_id": ASSET }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_message(&response).contains("amount_to_sell"));

    let response = app
        .server
        .post("/api/wallet/sell/start")
        .add_header(name, value)
        .json(&json!({ "asset_id": ASSET, "amount_to_sell": 0 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = app
        .server
        .post("/api/wallet/buy/complete")
        .json(&json!({ "psbt": "", "anchor_psbt": "00", "amount_sats_to_pay": 1 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    assert!(app.assets.state().calls.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_no_exact_utxo_is_unprocessable() -> Result<()> {
    let app = create_test_app()?;
    let caller = caller_key();
    app.assets.state().utxos = managed_utxos(&[(0, &caller, ASSET, 1200), (1, &caller, ASSET, 500)]);
    let (name, value) = caller_header()?;

    let response = app
        .server
        .post("/api/wallet/sell/start")
        .add_header(name, value)
        .json(&json!({ "asset_id": ASSET, "amount_to_sell": 700 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error_message(&response).contains("[500, 1200]"));
    Ok(())
}

#[tokio::test]
async fn test_sell_over_http_and_replay() -> Result<()> {
    let app = create_test_app()?;
    let caller = caller_key();
    app.assets.state().utxos = managed_utxos(&[(0, &caller, ASSET, 1200)]);
    let (name, value) = caller_header()?;

    let response = app
        .server
        .post("/api/wallet/sell/start")
        .add_header(name, value)
        .json(&json!({ "asset_id": ASSET, "amount_to_sell": 1200 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let started: Value = response.json();
    let funded_psbt = started["result"]["funded_psbt"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let sighash = started["result"]["sighash_hex_to_sign"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert_eq!(started["result"]["change_output_index"], 1);
    assert!(!funded_psbt.is_empty());

    let complete = json!({
        "psbt": funded_psbt,
        "sighash_hex": sighash,
        "signature_hex": mock_signature(&sighash),
        "amount_sats_to_receive": 25_000,
    });
    let response = app
        .server
        .post("/api/wallet/sell/complete")
        .json(&complete)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let completed: Value = response.json();
    assert!(
        completed["result"]["signed_virtual_psbt"]
            .as_str()
            .is_some_and(|psbt| psbt.starts_with("signed:"))
    );
    assert!(completed["result"]["modified_anchor_psbt"].is_string());

    let response = app
        .server
        .post("/api/wallet/sell/complete")
        .json(&complete)
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() -> Result<()> {
    let app = create_test_app()?;
    app.assets.state().fail_commit = true;

    let response = app
        .server
        .post("/api/wallet/buy/complete")
        .json(&json!({
            "psbt": "seller-vpsbt",
            "anchor_psbt": anchor_psbt_hex(1, 2),
            "amount_sats_to_pay": 50_000,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert!(error_message(&response).contains("insufficient funds"));
    assert!(app.wallet.state().signed.is_empty());

    let response = app
        .server
        .post("/api/wallet/send/decode")
        .json(&json!({ "address": "not-an-address" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    Ok(())
}

#[tokio::test]
async fn test_balances_and_transfers() -> Result<()> {
    let app = create_test_app()?;
    let caller = caller_key();
    let other = other_key();
    app.assets.state().utxos = managed_utxos(&[
        (0, &caller, ASSET, 1200),
        (1, &caller, ASSET, 500),
        (2, &other, "ef", 900),
    ]);
    let (name, value) = caller_header()?;

    let response = app
        .server
        .get("/api/wallet/balances")
        .add_header(name.clone(), value.clone())
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["result"]["asset_balances"][ASSET]["balance"], 1700);
    assert_eq!(body["result"]["asset_balances"]["ef"]["balance"], 0);

    let response = app
        .server
        .get("/api/wallet/transfers")
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "result": [] }));
    Ok(())
}

#[tokio::test]
async fn test_receive() -> Result<()> {
    let app = create_test_app()?;
    let (name, value) = caller_header()?;

    let response = app
        .server
        .post("/api/wallet/receive")
        .add_header(name, value)
        .json(&json!({ "asset_id": ASSET, "amt": 42 }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["result"]["encoded"], format!("taprt1{}", ASSET));
    assert_eq!(body["result"]["amount"], "42");
    Ok(())
}
