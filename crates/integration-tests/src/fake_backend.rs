//! In-process fake of the REST backend.
//!
//! Serves every endpoint checkout consumes on an ephemeral port, counts calls
//! per endpoint and keeps the bodies it received. Behaviour is switched per
//! test through [`FakeBackend::configure`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use url::Url;

/// Secret the fake gateway signs with.
pub const GATEWAY_SECRET: &str = "kirana_test_gateway_secret";

/// Path the fake serves the checkout script from.
pub const SCRIPT_PATH: &str = "/static/checkout.js";

/// Signature the gateway would produce for a payment.
///
/// HMAC-SHA256 over `"<gateway_order_id>|<payment_id>"`, hex encoded.
#[must_use]
pub fn sign(gateway_order_id: &str, payment_id: &str) -> String {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(GATEWAY_SECRET.as_bytes()) else {
        return String::new();
    };
    mac.update(format!("{gateway_order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

// =============================================================================
// Behaviour
// =============================================================================

/// How `POST /api/orders` answers.
#[derive(Debug, Clone)]
pub enum OrderReply {
    /// `{"id": <id>}`.
    Id(i32),
    /// `{"data": {"order_id": "<id>"}}`.
    WrappedOrderId(i32),
    /// Any other status and body.
    Status(u16, Value),
}

/// How `verify-payment` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyReply {
    /// Check the signature with [`sign`].
    Signature,
    /// Check the signature, answering `{"verified": <bool>, "data": {...}}`.
    SignatureWithData,
    /// `{"verified": <bool>}` regardless of input.
    Always(bool),
    /// `{}`.
    MissingField,
    /// HTTP 500.
    ServerError,
}

/// Switchable behaviour of the fake backend.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub order: OrderReply,
    /// `None` makes the summary endpoint fail.
    pub summary: Option<Value>,
    pub gateway_order_id: String,
    pub gateway_order_fails: bool,
    /// Minor-unit amount the gateway reports instead of the requested one.
    pub gateway_amount: Option<i64>,
    pub verify: VerifyReply,
    pub payment_fails: bool,
    pub script_available: bool,
    pub payment_methods: Value,
    pub shipping_methods: Value,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            order: OrderReply::Id(77),
            summary: Some(json!({
                "subtotal": "500.00",
                "shipping": "40.00",
                "tax": "0.00",
                "total": "540.00"
            })),
            gateway_order_id: "g1".to_string(),
            gateway_order_fails: false,
            gateway_amount: None,
            verify: VerifyReply::Signature,
            payment_fails: false,
            script_available: true,
            payment_methods: json!([
                {"id": 3, "method_type": "razorpay", "provider": "razorpay", "is_default": true},
                {"id": 4, "method_type": "cod", "is_default": false}
            ]),
            shipping_methods: json!({"data": [
                {"id": 1, "name": "Standard", "price": "40.00", "estimated_days": "3-5"},
                {"id": 2, "name": "Express", "price": "90.00", "estimated_days": "1-2"}
            ]}),
        }
    }
}

/// Calls received per endpoint.
#[derive(Debug, Default)]
pub struct Counters {
    pub orders: AtomicUsize,
    pub summaries: AtomicUsize,
    pub gateway_orders: AtomicUsize,
    pub verifications: AtomicUsize,
    pub payments: AtomicUsize,
    pub shipping_methods: AtomicUsize,
    pub script_fetches: AtomicUsize,
}

/// Current value of one of the [`Counters`].
#[must_use]
pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Debug, Default)]
struct Recorded {
    orders: Vec<Value>,
    gateway_orders: Vec<Value>,
    payments: Vec<Value>,
    addresses: Vec<Value>,
    authorization: Vec<Option<String>>,
}

#[derive(Debug, Default)]
struct FakeState {
    behaviour: Mutex<Behaviour>,
    counters: Counters,
    recorded: Mutex<Recorded>,
}

impl FakeState {
    fn behaviour(&self) -> Behaviour {
        lock(&self.behaviour).clone()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        lock(&self.recorded)
    }

    fn note_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.recorded().authorization.push(auth);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// FakeBackend
// =============================================================================

/// A running fake backend.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<FakeState>,
    server: tokio::task::JoinHandle<()>,
}

impl FakeBackend {
    /// Start a fake backend on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    #[allow(clippy::unwrap_used)]
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the fake, with a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// URL of the fake checkout script.
    ///
    /// # Panics
    ///
    /// Never in practice; the address is always a valid URL.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn script_url(&self) -> Url {
        Url::parse(&format!("http://{}{SCRIPT_PATH}", self.addr)).unwrap()
    }

    /// Change behaviour for subsequent calls.
    pub fn configure(&self, f: impl FnOnce(&mut Behaviour)) {
        f(&mut lock(&self.state.behaviour));
    }

    #[must_use]
    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    /// Bodies received by `POST /api/orders`.
    #[must_use]
    pub fn orders(&self) -> Vec<Value> {
        self.state.recorded().orders.clone()
    }

    /// Bodies received by `create-order`.
    #[must_use]
    pub fn gateway_orders(&self) -> Vec<Value> {
        self.state.recorded().gateway_orders.clone()
    }

    /// Bodies received by `POST /api/payments`.
    #[must_use]
    pub fn payments(&self) -> Vec<Value> {
        self.state.recorded().payments.clone()
    }

    /// `Authorization` header of every request, in order.
    #[must_use]
    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.state.recorded().authorization.clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/api/orders", post(place_order))
        .route("/api/cart-summary/", get(cart_summary))
        .route("/api/payments/razorpay/create-order", post(create_gateway_order))
        .route("/api/payments/razorpay/verify-payment", post(verify_payment))
        .route("/api/payments", post(record_payment))
        .route("/api/payment-methods/", get(payment_methods))
        .route("/api/shipping/", get(shipping_methods))
        .route("/api/users/addresses/", get(list_addresses).post(create_address))
        .route(
            "/api/users/addresses/{id}/",
            put(update_address).delete(delete_address),
        )
        .route(SCRIPT_PATH, get(script))
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = State<Arc<FakeState>>;

async fn place_order(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.counters.orders.fetch_add(1, Ordering::SeqCst);
    state.note_auth(&headers);
    state.recorded().orders.push(body);

    match state.behaviour().order {
        OrderReply::Id(id) => (StatusCode::CREATED, Json(json!({"id": id, "status": "pending"})))
            .into_response(),
        OrderReply::WrappedOrderId(id) => {
            Json(json!({"data": {"order_id": id.to_string()}})).into_response()
        }
        OrderReply::Status(status, body) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct SummaryQuery {
    shipping_method_id: i32,
}

async fn cart_summary(State(state): Shared, Query(query): Query<SummaryQuery>) -> Response {
    state.counters.summaries.fetch_add(1, Ordering::SeqCst);
    match state.behaviour().summary {
        Some(mut summary) => {
            summary["shipping_method_id"] = query.shipping_method_id.into();
            Json(summary).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "summary unavailable").into_response(),
    }
}

async fn create_gateway_order(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.counters.gateway_orders.fetch_add(1, Ordering::SeqCst);
    state.recorded().gateway_orders.push(body.clone());
    let behaviour = state.behaviour();
    if behaviour.gateway_order_fails {
        return (StatusCode::BAD_GATEWAY, "gateway down").into_response();
    }

    // The gateway answers in minor units.
    let amount = body["amount"]
        .as_f64()
        .and_then(Decimal::from_f64_retain)
        .and_then(|major| (major * Decimal::ONE_HUNDRED).round().to_i64())
        .unwrap_or_default();
    let amount = behaviour.gateway_amount.unwrap_or(amount);
    Json(json!({
        "id": behaviour.gateway_order_id,
        "entity": "order",
        "amount": amount,
        "currency": body["currency"],
        "receipt": body["receipt"],
        "status": "created"
    }))
    .into_response()
}

async fn verify_payment(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.counters.verifications.fetch_add(1, Ordering::SeqCst);
    match state.behaviour().verify {
        VerifyReply::Signature => Json(json!({"verified": signature_matches(&body)})).into_response(),
        VerifyReply::SignatureWithData => Json(json!({
            "verified": signature_matches(&body),
            "data": {"payment_id": body["razorpay_payment_id"]}
        }))
        .into_response(),
        VerifyReply::Always(verified) => Json(json!({"verified": verified})).into_response(),
        VerifyReply::MissingField => Json(json!({})).into_response(),
        VerifyReply::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, "verifier crashed").into_response()
        }
    }
}

fn signature_matches(body: &Value) -> bool {
    let expected = sign(
        body["razorpay_order_id"].as_str().unwrap_or_default(),
        body["razorpay_payment_id"].as_str().unwrap_or_default(),
    );
    body["razorpay_signature"].as_str() == Some(expected.as_str())
}

async fn record_payment(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.counters.payments.fetch_add(1, Ordering::SeqCst);
    state.recorded().payments.push(body.clone());
    if state.behaviour().payment_fails {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "payment rejected"})),
        )
            .into_response();
    }

    let mut payment = body;
    payment["id"] = json!(501);
    payment["created_at"] = json!("2026-10-19T10:00:00Z");
    (StatusCode::CREATED, Json(json!({"data": payment}))).into_response()
}

async fn payment_methods(State(state): Shared) -> Json<Value> {
    Json(state.behaviour().payment_methods)
}

async fn shipping_methods(State(state): Shared) -> Json<Value> {
    state.counters.shipping_methods.fetch_add(1, Ordering::SeqCst);
    Json(state.behaviour().shipping_methods)
}

async fn list_addresses(State(state): Shared, headers: HeaderMap) -> Json<Value> {
    state.note_auth(&headers);
    let mut addresses = vec![json!({
        "id": 1,
        "full_name": "Asha Rao",
        "address_line1": "12 MG Road",
        "city": "Bengaluru",
        "state": "KA",
        "country": "India",
        "postal_code": "560001",
        "phone": "+91 98450 00000"
    })];
    addresses.extend(state.recorded().addresses.iter().cloned());
    Json(Value::Array(addresses))
}

async fn create_address(State(state): Shared, Json(mut body): Json<Value>) -> impl IntoResponse {
    let mut recorded = state.recorded();
    body["id"] = json!(recorded.addresses.len() + 2);
    recorded.addresses.push(body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn update_address(Path(id): Path<i32>, Json(mut body): Json<Value>) -> Json<Value> {
    body["id"] = json!(id);
    Json(body)
}

async fn delete_address(Path(_id): Path<i32>) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn script(State(state): Shared) -> Response {
    state.counters.script_fetches.fetch_add(1, Ordering::SeqCst);
    if state.behaviour().script_available {
        (
            [(header::CONTENT_TYPE, "application/javascript")],
            "window.Razorpay = function (options) { this.options = options; };",
        )
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}
