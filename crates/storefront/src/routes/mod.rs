//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                    - Health check
//!
//! # Checkout
//! GET  /checkout/sdk.js                           - Gateway checkout script (503 until loaded)
//! GET  /checkout/options                          - Addresses, payment and shipping methods
//! POST /checkout                                  - Open a session for a cart
//! GET  /checkout/{session}                        - Session status, summary and selection
//! PUT  /checkout/{session}/selection              - Update selections
//! POST /checkout/{session}/place                  - Place the order and start payment
//! POST /checkout/{session}/pay?order_id=          - Pay for an order placed earlier
//! GET  /checkout/{session}/payment                - Widget options for the open payment window
//! POST /checkout/{session}/acknowledge            - Dismiss the outcome message
//!
//! # Widget callbacks
//! POST /checkout/payments/{gateway_order}/success - Payment completed
//! POST /checkout/payments/{gateway_order}/dismiss - Payment window closed
//! ```

pub mod checkout;

use std::time::Duration;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout::open_session))
        .route("/checkout/sdk.js", get(checkout::sdk_script))
        .route("/checkout/options", get(checkout::options))
        .route("/checkout/{session}", get(checkout::show))
        .route("/checkout/{session}/selection", put(checkout::update_selection))
        .route("/checkout/{session}/place", post(checkout::place))
        .route("/checkout/{session}/pay", post(checkout::pay))
        .route("/checkout/{session}/payment", get(checkout::payment_window))
        .route("/checkout/{session}/acknowledge", post(checkout::acknowledge))
        .route(
            "/checkout/payments/{gateway_order}/success",
            post(checkout::payment_succeeded),
        )
        .route(
            "/checkout/payments/{gateway_order}/dismiss",
            post(checkout::payment_dismissed),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(checkout_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Build the storefront application: routes, request ids and request tracing.
///
/// Sentry layers are added by the binary, outermost.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
