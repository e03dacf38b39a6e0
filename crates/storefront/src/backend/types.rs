//! Wire types for the REST backend.
//!
//! One struct per request or response body. Field names match the JSON the
//! backend speaks; money is `Decimal` in major units unless noted.

use chrono::{DateTime, Utc};
use kirana_core::{
    AddressId, CurrencyCode, OrderId, PaymentId, PaymentMethodId, PaymentMethodKind,
    ShippingMethodId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Options
// =============================================================================

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: AddressId,
    pub full_name: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Body for creating or replacing an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub address_line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub country: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A payment method the shopper can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub method_type: PaymentMethodKind,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Masked display fields; which ones are present depends on the type.
    #[serde(default)]
    pub card_last4: Option<String>,
    #[serde(default)]
    pub card_brand: Option<String>,
    #[serde(default)]
    pub upi_id: Option<String>,
}

impl PaymentMethod {
    /// Whether this method is paid through the hosted gateway UI.
    #[must_use]
    pub const fn uses_hosted_gateway(&self) -> bool {
        self.method_type.uses_hosted_gateway()
    }
}

/// A shipping option with its flat price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingMethod {
    pub id: ShippingMethodId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub estimated_days: Option<String>,
}

/// Backend-computed totals for the cart and a shipping method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

// =============================================================================
// Orders
// =============================================================================

/// Body of `POST /api/orders`. Built once per submission and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub shipping_address_id: AddressId,
    pub shipping_method_id: ShippingMethodId,
    pub payment_method_id: PaymentMethodId,
}

// =============================================================================
// Gateway
// =============================================================================

/// Body of `POST /api/payments/razorpay/create-order`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrderRequest {
    /// Major units; the backend converts to the gateway's minor units.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub receipt: String,
    pub notes: serde_json::Map<String, serde_json::Value>,
}

/// Order created at the gateway for one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor units (paise for INR).
    pub amount: i64,
    pub currency: CurrencyCode,
}

/// Body of `POST /api/payments/razorpay/verify-payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_payment_id: String,
    pub razorpay_order_id: String,
    pub razorpay_signature: String,
}

/// Response of the verification endpoint. Only `Some(true)` means verified.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct VerifyPaymentResponse {
    #[serde(default)]
    pub verified: Option<bool>,
}

// =============================================================================
// Payments
// =============================================================================

/// Metadata stored alongside a recorded payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub payment_time: DateTime<Utc>,
    pub status: String,
    pub gateway_order_id: String,
}

/// Body of `POST /api/payments`.
#[derive(Debug, Clone, Serialize)]
pub struct NewPayment {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub order_id: OrderId,
    pub payment_method_id: PaymentMethodId,
    pub gateway: String,
    pub description: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub gateway_signature: String,
    pub is_installment: bool,
    pub is_recurring: bool,
    pub metadata: PaymentMetadata,
}

/// A payment recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub order_id: OrderId,
    pub payment_method_id: PaymentMethodId,
    pub gateway: String,
    #[serde(default)]
    pub gateway_order_id: Option<String>,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    #[serde(default)]
    pub gateway_signature: Option<String>,
    #[serde(default)]
    pub is_installment: bool,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_order_request_amount_is_numeric() {
        let body = GatewayOrderRequest {
            amount: Decimal::new(540, 0),
            currency: CurrencyCode::INR,
            receipt: "order_77".to_string(),
            notes: serde_json::Map::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["amount"], serde_json::json!(540.0));
        assert_eq!(json["currency"], "INR");
    }

    #[test]
    fn test_payment_method_defaults() {
        let method: PaymentMethod =
            serde_json::from_str(r#"{"id": 3, "method_type": "razorpay"}"#).unwrap();
        assert!(method.uses_hosted_gateway());
        assert!(!method.is_default);
        assert!(method.card_last4.is_none());
    }

    #[test]
    fn test_verify_response_missing_field_is_not_verified() {
        let response: VerifyPaymentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.verified, None);
    }

    #[test]
    fn test_shipping_method_accepts_numeric_price() {
        let method: ShippingMethod =
            serde_json::from_str(r#"{"id": 1, "name": "Standard", "price": 40}"#).unwrap();
        assert_eq!(method.price, Decimal::new(40, 0));
    }
}
