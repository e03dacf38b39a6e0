//! The storefront HTTP surface, driven the way the checkout page drives it.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use kirana_integration_tests::fixtures::{self, KEY_ID};
use kirana_integration_tests::{FakeBackend, count, sign};
use kirana_storefront::checkout::{CheckoutState, FailureCause};
use kirana_storefront::config::CheckoutConfig;
use kirana_storefront::routes;
use kirana_storefront::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Storefront {
    backend: FakeBackend,
    state: AppState,
    app: Router,
}

impl Storefront {
    async fn start() -> Self {
        Self::start_with(CheckoutConfig::default()).await
    }

    async fn start_with(checkout: CheckoutConfig) -> Self {
        let backend = FakeBackend::start().await;
        let mut config = fixtures::storefront_config(&backend);
        config.checkout = checkout;
        let state = AppState::new(config).unwrap();
        let app = routes::app(state.clone());
        Self {
            backend,
            state,
            app,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send(method, uri, body, None).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn open_session(&self, token: Option<&str>) -> String {
        let body = json!({
            "items": [{"id": 1, "name": "Basmati rice", "price": "250.00", "quantity": 2}],
            "contact": {"name": "Asha Rao", "email": "asha@example.com"}
        });
        let (status, bytes) = self
            .send(Method::POST, "/checkout", Some(body), token)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: Value = serde_json::from_slice(&bytes).unwrap();
        created["session_id"].as_str().unwrap().to_string()
    }

    async fn select(&self, session: &str, payment_method_id: i32) -> Value {
        let (status, view) = self
            .json(
                Method::PUT,
                &format!("/checkout/{session}/selection"),
                Some(json!({
                    "address_id": 1,
                    "shipping_method_id": 1,
                    "payment_method_id": payment_method_id
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        view
    }

    /// Poll the session until its checkout reaches `state`.
    async fn wait_for_state(&self, session: &str, state: &str) -> Value {
        for _ in 0..200 {
            let (_, view) = self
                .json(Method::GET, &format!("/checkout/{session}"), None)
                .await;
            if view["status"]["state"] == state {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("checkout never reached {state}");
    }

    /// Poll until the session's payment window is open.
    async fn wait_for_window(&self, session: &str) -> Value {
        for _ in 0..200 {
            let (status, window) = self
                .json(Method::GET, &format!("/checkout/{session}/payment"), None)
                .await;
            if status == StatusCode::OK {
                return window;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("payment window never opened");
    }
}

#[tokio::test]
async fn test_health() {
    let storefront = Storefront::start().await;
    let (status, body) = storefront.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let storefront = Storefront::start().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();

    let response = storefront.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_gateway_checkout_over_http() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;

    let view = storefront.select(&session, 3).await;
    assert_eq!(view["summary"]["total"], "540.00");
    assert_eq!(view["status"]["state"], "idle");

    let (status, accepted) = storefront
        .json(Method::POST, &format!("/checkout/{session}/place"), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["state"], "placing");

    let window = storefront.wait_for_window(&session).await;
    assert_eq!(window["script"], "/checkout/sdk.js");
    assert_eq!(window["options"]["key"], KEY_ID);
    assert_eq!(window["options"]["amount"], 54_000);
    assert_eq!(window["options"]["currency"], "INR");
    assert_eq!(window["options"]["order_id"], "g1");
    assert_eq!(window["options"]["prefill"]["email"], "asha@example.com");
    let success_url = window["success_url"].as_str().unwrap().to_string();
    assert_eq!(success_url, "/checkout/payments/g1/success");

    let callback = json!({
        "razorpay_payment_id": "pay_1",
        "razorpay_order_id": "g1",
        "razorpay_signature": sign("g1", "pay_1")
    });
    let (status, _) = storefront
        .send(Method::POST, &success_url, Some(callback.clone()), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let view = storefront.wait_for_state(&session, "succeeded").await;
    assert_eq!(view["status"]["payment_status"], "paid");
    assert_eq!(view["status"]["order_id"], 77);
    assert_eq!(view["items"], json!([]));

    // The widget may post twice; only the first callback counts.
    let (status, _) = storefront
        .send(Method::POST, &success_url, Some(callback), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(count(&storefront.backend.counters().payments), 1);
    assert_eq!(count(&storefront.backend.counters().orders), 1);

    let (status, ack) = storefront
        .json(Method::POST, &format!("/checkout/{session}/acknowledge"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["redirect"], "/order-confirmation?order_id=77");
}

#[tokio::test]
async fn test_dismissed_window_cancels_and_allows_retry() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;
    storefront.select(&session, 3).await;

    storefront
        .json(Method::POST, &format!("/checkout/{session}/place"), None)
        .await;
    let window = storefront.wait_for_window(&session).await;

    // A second submit while the window is open is rejected.
    let (status, _) = storefront
        .send(Method::POST, &format!("/checkout/{session}/place"), None, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = storefront
        .send(
            Method::POST,
            window["dismiss_url"].as_str().unwrap(),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let view = storefront.wait_for_state(&session, "cancelled").await;
    assert_eq!(view["items"].as_array().unwrap().len(), 1);
    assert_eq!(count(&storefront.backend.counters().payments), 0);

    let (status, _) = storefront
        .send(Method::POST, &format!("/checkout/{session}/place"), None, None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    storefront.wait_for_window(&session).await;
    assert_eq!(count(&storefront.backend.counters().orders), 2);
    assert_eq!(storefront.state.hosted().open_count(), 1);
}

#[tokio::test]
async fn test_expired_session_closes_its_payment_window() {
    let storefront = Storefront::start_with(CheckoutConfig {
        session_ttl: Duration::from_millis(200),
        ..CheckoutConfig::default()
    })
    .await;
    let session = storefront.open_session(None).await;
    storefront.select(&session, 3).await;
    storefront
        .json(Method::POST, &format!("/checkout/{session}/place"), None)
        .await;
    storefront.wait_for_window(&session).await;

    let held = storefront
        .state
        .sessions()
        .get(session.parse().unwrap())
        .await
        .unwrap();
    let mut status = held.orchestrator().subscribe();
    assert_eq!(storefront.state.hosted().open_count(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    storefront.state.sessions().purge_expired().await;

    assert_eq!(storefront.state.hosted().open_count(), 0);
    let ended = tokio::time::timeout(
        Duration::from_secs(2),
        status.wait_for(|status| status.state == CheckoutState::Failed),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(ended.failure, Some(FailureCause::PaymentWindowUnavailable));
    assert_eq!(count(&storefront.backend.counters().payments), 0);

    let (status, _) = storefront
        .send(Method::GET, &format!("/checkout/{session}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cash_on_delivery_over_http() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;
    storefront.select(&session, 4).await;

    let (status, _) = storefront
        .send(Method::POST, &format!("/checkout/{session}/place"), None, None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let view = storefront.wait_for_state(&session, "succeeded").await;
    assert_eq!(view["status"]["payment_status"], "pending");
    assert_eq!(count(&storefront.backend.counters().gateway_orders), 0);
}

#[tokio::test]
async fn test_pay_resumes_existing_order() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;
    storefront.select(&session, 3).await;

    let (status, accepted) = storefront
        .json(Method::POST, &format!("/checkout/{session}/pay?order_id=41"), None)
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["order_id"], 41);

    storefront.wait_for_window(&session).await;
    assert_eq!(count(&storefront.backend.counters().orders), 0);
    assert_eq!(storefront.backend.gateway_orders()[0]["receipt"], "order_41");
}

#[tokio::test]
async fn test_place_without_selection_is_unprocessable() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;

    let (status, body) = storefront
        .send(Method::POST, &format!("/checkout/{session}/place"), None, None)
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, b"Please select a shipping address");
    assert_eq!(count(&storefront.backend.counters().orders), 0);
}

#[tokio::test]
async fn test_unknown_payment_method_is_unprocessable() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;

    let (status, _) = storefront
        .send(
            Method::PUT,
            &format!("/checkout/{session}/selection"),
            Some(json!({"payment_method_id": 99})),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let storefront = Storefront::start().await;

    let (status, _) = storefront
        .send(Method::POST, "/checkout", Some(json!({"items": []})), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let storefront = Storefront::start().await;
    let uri = format!("/checkout/{}", uuid::Uuid::new_v4());

    let (status, _) = storefront.send(Method::GET, &uri, None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_payment_window_absent_before_payment() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(None).await;

    let (status, _) = storefront
        .send(Method::GET, &format!("/checkout/{session}/payment"), None, None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sdk_script_served_once_loaded() {
    let storefront = Storefront::start().await;

    let (status, _) = storefront
        .send(Method::GET, "/checkout/sdk.js", None, None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    storefront.state.sdk().load().await.unwrap();
    let (status, body) = storefront
        .send(Method::GET, "/checkout/sdk.js", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with(b"window.Razorpay"));
}

#[tokio::test]
async fn test_options_lists_choices() {
    let storefront = Storefront::start().await;

    let (status, body) = storefront
        .send(Method::GET, "/checkout/options", None, Some("shopper-1"))
        .await;
    assert_eq!(status, StatusCode::OK);

    let options: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(options["addresses"][0]["full_name"], "Asha Rao");
    assert_eq!(options["payment_methods"].as_array().unwrap().len(), 2);
    assert_eq!(options["shipping_methods"][1]["name"], "Express");
    assert_eq!(
        storefront.backend.authorization_headers(),
        vec![Some("Bearer shopper-1".to_string())]
    );
}

#[tokio::test]
async fn test_session_forwards_shopper_token() {
    let storefront = Storefront::start().await;
    let session = storefront.open_session(Some("shopper-2")).await;
    storefront.select(&session, 4).await;

    storefront
        .send(Method::POST, &format!("/checkout/{session}/place"), None, None)
        .await;
    storefront.wait_for_state(&session, "succeeded").await;

    assert_eq!(
        storefront.backend.authorization_headers(),
        vec![Some("Bearer shopper-2".to_string())]
    );
}
