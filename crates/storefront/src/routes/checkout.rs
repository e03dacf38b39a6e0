//! Checkout route handlers.
//!
//! The checkout page talks JSON to these handlers. A session holds the cart
//! and one orchestrator; placing an order returns `202 Accepted` immediately
//! and the page polls the session for progress. While a payment window is
//! open the page fetches its widget options, renders the gateway widget, and
//! posts the widget's callbacks back.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use kirana_core::{Contact, OrderId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::backend::{PaymentMethod, ShippingAddress, ShippingMethod};
use crate::checkout::{
    Acknowledgement, CartItem, CheckoutRun, CheckoutSession, CheckoutStatus,
    GatewaySuccessResponse, SelectionUpdate, SessionView, WidgetOptions,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Path the checkout script is served from.
pub const SDK_PATH: &str = "/checkout/sdk.js";

// =============================================================================
// Request / response bodies
// =============================================================================

/// Body of `POST /checkout`.
#[derive(Debug, Deserialize)]
pub struct OpenSession {
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub contact: Contact,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

/// Everything the shopper can choose from.
#[derive(Debug, Serialize)]
pub struct CheckoutOptionsView {
    pub addresses: Vec<ShippingAddress>,
    pub payment_methods: Vec<PaymentMethod>,
    pub shipping_methods: Vec<ShippingMethod>,
}

#[derive(Debug, Deserialize)]
pub struct PayQuery {
    pub order_id: OrderId,
}

/// What the page needs to render the gateway widget.
#[derive(Debug, Serialize)]
pub struct PaymentWindow {
    pub script: &'static str,
    pub options: WidgetOptions,
    pub success_url: String,
    pub dismiss_url: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve the gateway checkout script once it has been fetched.
pub async fn sdk_script(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let script = state
        .sdk()
        .script()
        .ok_or_else(|| AppError::Unavailable("Checkout script is not loaded yet".into()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        script,
    ))
}

/// List saved addresses and available payment and shipping methods.
#[instrument(skip(state, headers))]
pub async fn options(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CheckoutOptionsView>> {
    let backend = match bearer_token(&headers) {
        Some(token) => state.backend().authenticated(token),
        None => state.backend().clone(),
    };
    let (addresses, payment_methods, shipping_methods) = tokio::try_join!(
        backend.addresses(),
        backend.payment_methods(),
        backend.shipping_methods(),
    )?;
    Ok(Json(CheckoutOptionsView {
        addresses,
        payment_methods,
        shipping_methods,
    }))
}

/// Open a checkout session for the posted cart.
#[instrument(skip(state, headers, body), fields(items = body.items.len()))]
pub async fn open_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<OpenSession>,
) -> Result<(StatusCode, Json<SessionCreated>)> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }
    if body.items.iter().any(|item| item.quantity == 0) {
        return Err(AppError::BadRequest("Item quantity must be at least 1".into()));
    }

    let session = state
        .sessions()
        .open(body.items, body.contact, bearer_token(&headers))
        .await;
    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id(),
        }),
    ))
}

pub async fn show(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionView>> {
    let session = find_session(&state, session_id).await?;
    Ok(Json(session.view()))
}

/// Update the shopper's choices. A shipping change recomputes the summary.
#[instrument(skip(state, update))]
pub async fn update_selection(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(update): Json<SelectionUpdate>,
) -> Result<Json<SessionView>> {
    let session = find_session(&state, session_id).await?;
    session.update_selection(update).await?;
    Ok(Json(session.view()))
}

/// Place the order and start payment in the background.
#[instrument(skip(state))]
pub async fn place(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<(StatusCode, Json<CheckoutStatus>)> {
    let session = find_session(&state, session_id).await?;
    let run = session.submit()?;
    let session_tag = session_id.to_string();
    add_breadcrumb(
        "checkout",
        "Order submitted",
        Some(&[("session", session_tag.as_str())]),
    );
    Ok(start(&session, run))
}

/// Start payment for an order placed earlier.
#[instrument(skip(state))]
pub async fn pay(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<PayQuery>,
) -> Result<(StatusCode, Json<CheckoutStatus>)> {
    let session = find_session(&state, session_id).await?;
    let run = session.resume(query.order_id)?;
    Ok(start(&session, run))
}

/// Widget options for the session's open payment window.
pub async fn payment_window(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<PaymentWindow>> {
    let session = find_session(&state, session_id).await?;
    let gateway_order_id = session
        .orchestrator()
        .status()
        .gateway_order_id
        .ok_or_else(|| AppError::NotFound("No payment window is open".into()))?;
    let options = state
        .hosted()
        .widget(&gateway_order_id)
        .ok_or_else(|| AppError::NotFound("No payment window is open".into()))?;

    Ok(Json(PaymentWindow {
        script: SDK_PATH,
        success_url: format!("/checkout/payments/{gateway_order_id}/success"),
        dismiss_url: format!("/checkout/payments/{gateway_order_id}/dismiss"),
        options,
    }))
}

/// Widget success callback.
#[instrument(skip(state, response))]
pub async fn payment_succeeded(
    State(state): State<AppState>,
    Path(gateway_order): Path<String>,
    Json(response): Json<GatewaySuccessResponse>,
) -> Result<StatusCode> {
    if state.hosted().complete(&gateway_order, response) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound("No payment window is open".into()))
    }
}

/// Widget dismissal callback.
#[instrument(skip(state))]
pub async fn payment_dismissed(
    State(state): State<AppState>,
    Path(gateway_order): Path<String>,
) -> Result<StatusCode> {
    if state.hosted().dismiss(&gateway_order) {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound("No payment window is open".into()))
    }
}

/// Dismiss the success or failure message.
pub async fn acknowledge(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Acknowledgement>> {
    let session = find_session(&state, session_id).await?;
    Ok(Json(session.orchestrator().acknowledge()))
}

// =============================================================================
// Helpers
// =============================================================================

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<CheckoutSession>> {
    state
        .sessions()
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Checkout session {id}")))
}

/// Drive `run` on a background task and report the accepted status.
fn start(session: &CheckoutSession, run: CheckoutRun) -> (StatusCode, Json<CheckoutStatus>) {
    let status = session.orchestrator().status();
    let session_id = session.id();
    tokio::spawn(async move {
        let state = run.execute().await;
        info!(session = %session_id, ?state, "Checkout run finished");
    });
    (StatusCode::ACCEPTED, Json(status))
}

/// Bearer token from the `Authorization` header, if any.
fn bearer_token(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| SecretString::from(token.to_owned()))
}
