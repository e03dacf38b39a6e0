//! Script loading and signature verification.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use kirana_core::CurrencyCode;
use kirana_integration_tests::{Harness, Shopper, VerifyReply, count, sign};
use kirana_storefront::checkout::{GatewayClient, GatewaySuccessResponse, SdkError};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_script_loads_once_for_concurrent_callers() {
    let harness = Harness::start(Shopper::paying()).await;
    let gateway = harness.gateway();

    let results = load_concurrently(&gateway).await;

    assert!(results.iter().all(|loaded| *loaded));
    assert!(harness.sdk.is_loaded());
    assert!(harness.sdk.script().unwrap().starts_with(b"window.Razorpay"));
    assert_eq!(count(&harness.backend.counters().script_fetches), 1);

    assert!(gateway.load_sdk().await);
    assert_eq!(count(&harness.backend.counters().script_fetches), 1);
}

async fn load_concurrently(gateway: &GatewayClient) -> [bool; 3] {
    let (a, b, c) = tokio::join!(gateway.load_sdk(), gateway.load_sdk(), gateway.load_sdk());
    [a, b, c]
}

#[tokio::test]
async fn test_failed_load_is_retried() {
    let harness = Harness::start(Shopper::paying()).await;
    harness.backend.configure(|b| b.script_available = false);

    let err = harness.sdk.load().await.unwrap_err();
    assert!(matches!(err, SdkError::Status(404)));
    assert!(!harness.sdk.is_loaded());

    harness.backend.configure(|b| b.script_available = true);
    assert!(harness.gateway().load_sdk().await);
    assert_eq!(count(&harness.backend.counters().script_fetches), 2);
}

#[tokio::test]
async fn test_gateway_without_script_reports_not_loaded() {
    let harness = Harness::start(Shopper::paying()).await;
    let gateway = GatewayClient::new(harness.client.clone());

    assert!(!gateway.load_sdk().await);
    assert_eq!(count(&harness.backend.counters().script_fetches), 0);
}

#[tokio::test]
async fn test_gateway_order_is_in_minor_units() {
    let harness = Harness::start(Shopper::paying()).await;

    let order = harness
        .gateway()
        .create_gateway_order(
            Decimal::new(54_050, 2),
            CurrencyCode::INR,
            "order_77",
            serde_json::Map::new(),
        )
        .await
        .unwrap();

    assert_eq!(order.id, "g1");
    assert_eq!(order.amount, 54_050);
    assert_eq!(order.currency, CurrencyCode::INR);
}

#[tokio::test]
async fn test_gateway_order_failure_is_none() {
    let harness = Harness::start(Shopper::paying()).await;
    harness.backend.configure(|b| b.gateway_order_fails = true);

    let order = harness
        .gateway()
        .create_gateway_order(
            Decimal::new(540, 0),
            CurrencyCode::INR,
            "order_77",
            serde_json::Map::new(),
        )
        .await;

    assert!(order.is_none());
}

#[tokio::test]
async fn test_gateway_order_for_wrong_amount_is_none() {
    let harness = Harness::start(Shopper::paying()).await;
    harness.backend.configure(|b| b.gateway_amount = Some(100));

    let order = harness
        .gateway()
        .create_gateway_order(
            Decimal::new(540, 0),
            CurrencyCode::INR,
            "order_77",
            serde_json::Map::new(),
        )
        .await;

    assert!(order.is_none());
    assert_eq!(count(&harness.backend.counters().gateway_orders), 1);
}

#[tokio::test]
async fn test_verify_accepts_only_explicit_true() {
    let harness = Harness::start(Shopper::paying()).await;
    let gateway = harness.gateway();
    let good = sign("g1", "pay_1");

    assert!(gateway.verify_signature("pay_1", "g1", &good).await);
    assert!(!gateway.verify_signature("pay_1", "g1", "forged").await);

    harness.backend.configure(|b| b.verify = VerifyReply::SignatureWithData);
    assert!(gateway.verify_signature("pay_1", "g1", &good).await);

    for reply in [VerifyReply::MissingField, VerifyReply::ServerError] {
        harness.backend.configure(|b| b.verify = reply);
        assert!(
            !gateway.verify_signature("pay_1", "g1", &good).await,
            "{reply:?}"
        );
    }
    assert_eq!(count(&harness.backend.counters().verifications), 5);
}

#[tokio::test]
async fn test_verified_payment_carries_gateway_ids() {
    let harness = Harness::start(Shopper::paying()).await;
    let gateway = harness.gateway();

    let verified = gateway
        .verify(GatewaySuccessResponse {
            payment_id: "pay_1".to_string(),
            order_id: "g1".to_string(),
            signature: sign("g1", "pay_1"),
        })
        .await
        .unwrap();

    assert_eq!(verified.payment_id(), "pay_1");
    assert_eq!(verified.gateway_order_id(), "g1");
    assert_eq!(verified.signature(), sign("g1", "pay_1"));

    let unverified = gateway
        .verify(GatewaySuccessResponse {
            payment_id: "pay_1".to_string(),
            order_id: "g1".to_string(),
            signature: sign("g1", "pay_9"),
        })
        .await;
    assert!(unverified.is_none());
}

#[tokio::test]
async fn test_shared_loader_serves_every_client() {
    let harness = Harness::start(Shopper::paying()).await;
    let first = harness.gateway();
    let second = GatewayClient::new(harness.client.clone()).with_sdk(Arc::clone(&harness.sdk));

    assert!(first.load_sdk().await);
    assert!(second.load_sdk().await);
    assert_eq!(count(&harness.backend.counters().script_fetches), 1);
}
