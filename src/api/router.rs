use std::time::Duration;

use axum::{
    Json, Router,
    http::{HeaderName, Request, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{MakeSpan, OnFailure, OnResponse, TraceLayer},
};
use tracing::{Level, Span, error, field, info, span};

use crate::rpc::{AssetDaemon, WalletDaemon};

use super::{
    Env,
    error::ErrorResponse,
    handlers::{
        get_balances, get_health, get_transfers, not_found, post_buy_complete, post_buy_start,
        post_receive, post_sell_complete, post_sell_start, post_send_complete, post_send_decode,
        post_send_start,
    },
};

#[derive(Clone)]
struct CustomMakeSpan;
impl<B> MakeSpan<B> for CustomMakeSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let id = req
            .extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or("unknown");
        span!(
            Level::INFO,
            "request",
            id = %id,
            method = %req.method(),
            path = %req.uri().path(),
            error = field::Empty,
        )
    }
}

#[derive(Clone)]
struct CustomOnResponse;
impl<B> OnResponse<B> for CustomOnResponse {
    fn on_response(self, res: &Response<B>, latency: Duration, _: &Span) {
        if res.status().is_success() {
            info!("{} {}ms", res.status(), latency.as_millis());
        } else {
            error!("{} {}ms", res.status(), latency.as_millis());
        }
    }
}

#[derive(Clone)]
struct NoOpOnFailure;
impl<B> OnFailure<B> for NoOpOnFailure {
    fn on_failure(&mut self, _res: B, _latency: Duration, _span: &Span) {}
}

fn handle_panic(panic: Box<dyn std::any::Any + Send>) -> axum::response::Response {
    let message = panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("Unknown panic occurred")
        .to_string();

    let error_response = Json(ErrorResponse { error: message });
    (StatusCode::INTERNAL_SERVER_ERROR, error_response).into_response()
}

fn wallet_routes<A: AssetDaemon, W: WalletDaemon>() -> Router<Env<A, W>> {
    Router::new()
        .nest(
            "/sell",
            Router::new()
                .route("/start", post(post_sell_start::<A, W>))
                .route("/complete", post(post_sell_complete::<A, W>)),
        )
        .nest(
            "/buy",
            Router::new()
                .route("/start", post(post_buy_start::<A, W>))
                .route("/complete", post(post_buy_complete::<A, W>)),
        )
        .nest(
            "/send",
            Router::new()
                .route("/decode", post(post_send_decode::<A, W>))
                .route("/start", post(post_send_start::<A, W>))
                .route("/complete", post(post_send_complete::<A, W>)),
        )
        .route("/receive", post(post_receive::<A, W>))
        .route("/balances", get(get_balances::<A, W>))
        .route("/transfers", get(get_transfers::<A, W>))
}

pub fn new<A: AssetDaemon, W: WalletDaemon>(env: Env<A, W>) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");
    let request_timeout = env.config.request_timeout();

    Router::new()
        .nest(
            "/api",
            Router::new()
                .route("/health", get(get_health))
                .nest("/wallet", wallet_routes()),
        )
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(CustomMakeSpan)
                        .on_response(CustomOnResponse)
                        .on_failure(NoOpOnFailure),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .with_state(env)
}
