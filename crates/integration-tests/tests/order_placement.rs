//! Order placement against the fake backend.

#![allow(clippy::unwrap_used)]

use kirana_core::OrderId;
use kirana_integration_tests::fixtures;
use kirana_integration_tests::{Harness, OrderReply, Shopper, count};
use kirana_storefront::checkout::{
    CheckoutSelection, MissingSelection, OrderPlacer, PlaceOrderError,
};
use serde_json::json;

fn placer(harness: &Harness) -> OrderPlacer {
    OrderPlacer::new(harness.client.clone(), "/checkout/payment")
}

#[tokio::test]
async fn test_missing_selection_makes_no_call() {
    let harness = Harness::start(Shopper::paying()).await;
    let placer = placer(&harness);
    let full = fixtures::selection(fixtures::gateway_method());

    let cases = [
        (
            CheckoutSelection {
                address_id: None,
                ..full.clone()
            },
            MissingSelection::Address,
        ),
        (
            CheckoutSelection {
                shipping_method: None,
                ..full.clone()
            },
            MissingSelection::ShippingMethod,
        ),
        (
            CheckoutSelection {
                payment_method: None,
                ..full
            },
            MissingSelection::PaymentMethod,
        ),
    ];

    for (selection, missing) in cases {
        let err = placer.place_order(&selection).await.unwrap_err();
        assert!(
            matches!(err, PlaceOrderError::MissingSelection(m) if m == missing),
            "{err:?}"
        );
        assert_eq!(err.user_message(), missing.to_string());
    }
    assert_eq!(count(&harness.backend.counters().orders), 0);
}

#[tokio::test]
async fn test_gateway_order_gets_payment_redirect() {
    let harness = Harness::start(Shopper::paying()).await;

    let placed = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap();

    assert_eq!(placed.order_id, OrderId::new(77));
    assert!(placed.requires_gateway());
    assert_eq!(
        placed.redirect_url.as_deref(),
        Some("/checkout/payment?order_id=77")
    );
}

#[tokio::test]
async fn test_cash_on_delivery_has_no_redirect() {
    let harness = Harness::start(Shopper::paying()).await;

    let placed = placer(&harness)
        .place_order(&fixtures::selection(fixtures::cod_method()))
        .await
        .unwrap();

    assert!(!placed.requires_gateway());
    assert!(placed.redirect_url.is_none());
    assert_eq!(harness.backend.orders()[0]["payment_method_id"], 4);
}

#[tokio::test]
async fn test_wrapped_string_order_id_is_accepted() {
    let harness = Harness::start(Shopper::paying()).await;
    harness
        .backend
        .configure(|b| b.order = OrderReply::WrappedOrderId(88));

    let placed = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap();

    assert_eq!(placed.order_id, OrderId::new(88));
}

#[tokio::test]
async fn test_order_id_beside_data_is_accepted() {
    let harness = Harness::start(Shopper::paying()).await;
    harness.backend.configure(|b| {
        b.order = OrderReply::Status(201, json!({"order_id": 77, "data": {"status": "created"}}));
    });

    let placed = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap();

    assert_eq!(placed.order_id, OrderId::new(77));
}

#[tokio::test]
async fn test_validation_detail_reaches_shopper() {
    let harness = Harness::start(Shopper::paying()).await;
    harness.backend.configure(|b| {
        b.order = OrderReply::Status(422, json!({"detail": "Item 1 is out of stock"}));
    });

    let err = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Item 1 is out of stock");
}

#[tokio::test]
async fn test_validation_without_detail_uses_generic_message() {
    let harness = Harness::start(Shopper::paying()).await;
    harness
        .backend
        .configure(|b| b.order = OrderReply::Status(422, json!({})));

    let err = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaceOrderError::Validation { detail: None }));
}

#[tokio::test]
async fn test_unauthorized_asks_for_sign_in() {
    let harness = Harness::start(Shopper::paying()).await;
    harness.backend.configure(|b| {
        b.order = OrderReply::Status(401, json!({"detail": "Not authenticated"}));
    });

    let err = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaceOrderError::AuthenticationRequired));
    assert_eq!(err.user_message(), "Please sign in to place your order.");
}

#[tokio::test]
async fn test_server_error_is_generic() {
    let harness = Harness::start(Shopper::paying()).await;
    harness
        .backend
        .configure(|b| b.order = OrderReply::Status(503, json!({"error": "db down"})));

    let err = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaceOrderError::Failed(_)));
    assert_eq!(err.user_message(), "Failed to place order. Please try again.");
}

#[tokio::test]
async fn test_response_without_id_fails() {
    let harness = Harness::start(Shopper::paying()).await;
    harness
        .backend
        .configure(|b| b.order = OrderReply::Status(201, json!({"status": "pending"})));

    let err = placer(&harness)
        .place_order(&fixtures::selection(fixtures::gateway_method()))
        .await
        .unwrap_err();

    assert!(matches!(err, PlaceOrderError::Failed(_)));
}
