//! REST backend client.
//!
//! # Architecture
//!
//! - One typed method per endpoint; no `serde_json::Value` escapes this module
//!   except free-form notes and metadata
//! - Responses may be bare or wrapped in `{"data": ...}`; top-level fields win
//!   over those inside `data`
//! - The shopper's bearer token is forwarded when present, otherwise the
//!   configured service token is used
//! - Shipping methods are cached via `moka` (5 minute TTL); everything else is
//!   per-shopper and always fetched
//!
//! # Example
//!
//! ```rust,ignore
//! use kirana_storefront::backend::BackendClient;
//!
//! let client = BackendClient::new(&config.backend)?.authenticated(token);
//! let methods = client.shipping_methods().await?;
//! let summary = client.cart_summary(methods[0].id).await?;
//! ```

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use kirana_core::{AddressId, OrderId, ShippingMethodId};
use moka::future::Cache;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::BackendConfig;

use cache::{CacheKey, CacheValue};
pub use types::*;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend requires a signed-in shopper (HTTP 401).
    #[error("Authentication required")]
    Unauthorized,

    /// Backend rejected the request shape (HTTP 422).
    #[error("Validation failed: {}", .detail.as_deref().unwrap_or("no detail"))]
    Validation { detail: Option<String> },

    /// Any other non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response parsed but lacked a required field.
    #[error("Response missing field: {0}")]
    MissingField(&'static str),

    /// Endpoint path could not be joined to the base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Decode a body that carries its payload bare or under `data`.
///
/// Fields at the top level win over same-named fields inside an object
/// `data`, so `{"order_id": 77, "data": {...}}` keeps its `order_id`. A
/// non-object `data` (a list) is the payload itself.
fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, serde_json::Error> {
    let mut value: serde_json::Value = serde_json::from_str(body)?;
    if let serde_json::Value::Object(map) = &mut value {
        match map.remove("data") {
            Some(serde_json::Value::Object(data)) => {
                for (key, field) in data {
                    map.entry(key).or_insert(field);
                }
            }
            Some(serde_json::Value::Null) | None => {}
            Some(data) => return serde_json::from_value(data),
        }
    }
    serde_json::from_value(value)
}

// =============================================================================
// BackendClient
// =============================================================================

/// Client for the REST backend.
///
/// Cheap to clone; clones share the HTTP connection pool and cache.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<BackendClientInner>,
    token: Option<SecretString>,
}

struct BackendClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(BackendClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
            token: config.api_token.clone(),
        })
    }

    /// A client that sends `token` as the bearer token.
    #[must_use]
    pub fn authenticated(&self, token: SecretString) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            token: Some(token),
        }
    }

    /// Base URL every endpoint is resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Build a request for a path relative to the base URL.
    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.inner.base_url.join(path)?;
        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        Ok(builder)
    }

    /// Send a request and return the successful response body as text.
    async fn send_raw(&self, builder: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ApiError::Validation {
                detail: extract_detail(&body),
            });
        }

        if !status.is_success() {
            tracing::warn!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }

    /// Send a request and decode the (possibly wrapped) JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.send_raw(builder).await?;
        match decode_body::<T>(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %body.chars().take(500).collect::<String>(),
                    "Failed to parse backend response"
                );
                Err(ApiError::Parse(e))
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(self.request(Method::GET, path)?).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(self.request(Method::POST, path)?.json(body)).await
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Place an order. Returns the new order's id.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized`, `Validation`, or another error if the backend
    /// rejects the order or the response has no order id.
    #[instrument(skip(self), fields(address = %request.shipping_address_id))]
    pub async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, ApiError> {
        let body = self
            .send_raw(self.request(Method::POST, "api/orders")?.json(request))
            .await?;
        let body: serde_json::Value = serde_json::from_str(&body)?;
        let order_id = extract_order_id(&body).ok_or(ApiError::MissingField("id"))?;
        debug!(order_id = %order_id, "Order placed");
        Ok(order_id)
    }

    /// Fetch the authoritative summary for the current cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn cart_summary(
        &self,
        shipping_method_id: ShippingMethodId,
    ) -> Result<CheckoutSummary, ApiError> {
        let builder = self
            .request(Method::GET, "api/cart-summary/")?
            .query(&[("shipping_method_id", shipping_method_id.as_i32())]);
        self.send(builder).await
    }

    /// Create an order at the payment gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self, request), fields(receipt = %request.receipt, amount = %request.amount))]
    pub async fn create_gateway_order(
        &self,
        request: &GatewayOrderRequest,
    ) -> Result<GatewayOrder, ApiError> {
        self.post("api/payments/razorpay/create-order", request)
            .await
    }

    /// Ask the backend to verify a gateway signature.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self, request), fields(gateway_order = %request.razorpay_order_id))]
    pub async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<VerifyPaymentResponse, ApiError> {
        self.post("api/payments/razorpay/verify-payment", request)
            .await
    }

    /// Record a verified payment against an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the record.
    #[instrument(skip(self, payment), fields(order_id = %payment.order_id))]
    pub async fn record_payment(&self, payment: &NewPayment) -> Result<Payment, ApiError> {
        self.post("api/payments", payment).await
    }

    // =========================================================================
    // Options
    // =========================================================================

    /// List shipping methods (cached).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn shipping_methods(&self) -> Result<Vec<ShippingMethod>, ApiError> {
        if let Some(CacheValue::ShippingMethods(methods)) =
            self.inner.cache.get(&CacheKey::ShippingMethods).await
        {
            debug!("Cache hit for shipping methods");
            return Ok(methods);
        }

        let methods: Vec<ShippingMethod> = self.get("api/shipping/").await?;
        self.inner
            .cache
            .insert(
                CacheKey::ShippingMethods,
                CacheValue::ShippingMethods(methods.clone()),
            )
            .await;
        Ok(methods)
    }

    /// List the shopper's payment methods.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, ApiError> {
        self.get("api/payment-methods/").await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// List the shopper's saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Result<Vec<ShippingAddress>, ApiError> {
        self.get("api/users/addresses/").await
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address.
    #[instrument(skip(self, address))]
    pub async fn create_address(&self, address: &AddressInput) -> Result<ShippingAddress, ApiError> {
        self.post("api/users/addresses/", address).await
    }

    /// Replace an existing address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self, address))]
    pub async fn update_address(
        &self,
        id: AddressId,
        address: &AddressInput,
    ) -> Result<ShippingAddress, ApiError> {
        let path = format!("api/users/addresses/{id}/");
        self.send(self.request(Method::PUT, &path)?.json(address))
            .await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the deletion.
    #[instrument(skip(self))]
    pub async fn delete_address(&self, id: AddressId) -> Result<(), ApiError> {
        let path = format!("api/users/addresses/{id}/");
        self.send_raw(self.request(Method::DELETE, &path)?)
            .await
            .map(|_| ())
    }
}

// =============================================================================
// Response helpers
// =============================================================================

/// Find the order id under `id` or `order_id`, at the top level or inside
/// `data`. Accepts numbers and numeric strings.
fn extract_order_id(body: &serde_json::Value) -> Option<OrderId> {
    std::iter::once(body)
        .chain(body.get("data"))
        .find_map(|value| {
            ["id", "order_id"]
                .into_iter()
                .find_map(|key| match value.get(key)? {
                    serde_json::Value::Number(n) => {
                        n.as_i64().and_then(|n| i32::try_from(n).ok())
                    }
                    serde_json::Value::String(s) => s.parse::<i32>().ok(),
                    _ => None,
                })
        })
        .map(OrderId::new)
}

/// Pull a human-readable message out of a 422 body.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"]
        .into_iter()
        .find_map(|key| match value.get(key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Some(other.to_string())
            }
            _ => None,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_order_id_variants() {
        assert_eq!(extract_order_id(&json!({"id": 77})), Some(OrderId::new(77)));
        assert_eq!(
            extract_order_id(&json!({"order_id": "78"})),
            Some(OrderId::new(78))
        );
        assert_eq!(
            extract_order_id(&json!({"data": {"order_id": 79}})),
            Some(OrderId::new(79))
        );
        assert_eq!(extract_order_id(&json!({"status": "ok"})), None);
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"detail": "Address does not belong to user"}"#).as_deref(),
            Some("Address does not belong to user")
        );
        assert!(extract_detail(r#"{"detail": [{"loc": ["body"]}]}"#).is_some());
        assert_eq!(extract_detail("<html>oops</html>"), None);
        assert_eq!(extract_detail(r#"{"detail": ""}"#), None);
    }

    #[test]
    fn test_decode_accepts_wrapped_and_bare() {
        let wrapped: CheckoutSummary = decode_body(
            r#"{"data": {"subtotal": 500, "shipping": 40, "tax": 0, "total": 540}}"#,
        )
        .unwrap();
        let bare: CheckoutSummary =
            decode_body(r#"{"subtotal": 500, "shipping": 40, "tax": 0, "total": 540}"#).unwrap();
        assert_eq!(wrapped, bare);

        let methods: Vec<ShippingMethod> = decode_body(
            r#"{"data": [{"id": 1, "name": "Standard", "price": "40.00"}], "count": 1}"#,
        )
        .unwrap();
        assert_eq!(methods.len(), 1);
    }

    #[test]
    fn test_decode_keeps_top_level_fields_beside_data() {
        let body: serde_json::Value =
            decode_body(r#"{"order_id": 77, "data": {"status": "created"}}"#).unwrap();
        assert_eq!(extract_order_id(&body), Some(OrderId::new(77)));
        assert_eq!(body["status"], "created");

        let verify: VerifyPaymentResponse =
            decode_body(r#"{"verified": true, "data": {"payment_id": "pay_1"}}"#).unwrap();
        assert_eq!(verify.verified, Some(true));

        let verify: VerifyPaymentResponse =
            decode_body(r#"{"success": true, "data": {"verified": true}}"#).unwrap();
        assert_eq!(verify.verified, Some(true));
    }

    #[test]
    fn test_decode_prefers_top_level_on_conflict() {
        let body: serde_json::Value =
            decode_body(r#"{"id": 77, "data": {"id": 12}}"#).unwrap();
        assert_eq!(extract_order_id(&body), Some(OrderId::new(77)));
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Validation { detail: None };
        assert_eq!(err.to_string(), "Validation failed: no detail");

        let err = ApiError::Status {
            status: 503,
            body: "down".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 503: down");
    }
}
