//! Catalogue data matching the fake backend's defaults.

use std::net::{IpAddr, Ipv4Addr};

use kirana_core::{
    AddressId, Contact, Email, PaymentMethodId, PaymentMethodKind, Phone, ProductId,
    ShippingMethodId,
};
use kirana_storefront::backend::{PaymentMethod, ShippingMethod};
use kirana_storefront::checkout::{Cart, CartItem, CheckoutRequest, CheckoutSelection};
use kirana_storefront::config::{BackendConfig, CheckoutConfig, GatewayConfig, StorefrontConfig};
use rust_decimal::Decimal;

use crate::fake_backend::FakeBackend;

/// Gateway key handed to the hosted UI in tests.
pub const KEY_ID: &str = "rzp_test_kirana";

/// Payment method 3, paid through the hosted gateway.
#[must_use]
pub fn gateway_method() -> PaymentMethod {
    payment_method(3, PaymentMethodKind::Gateway)
}

/// Payment method 4, cash on delivery.
#[must_use]
pub fn cod_method() -> PaymentMethod {
    payment_method(4, PaymentMethodKind::CashOnDelivery)
}

fn payment_method(id: i32, method_type: PaymentMethodKind) -> PaymentMethod {
    PaymentMethod {
        id: PaymentMethodId::new(id),
        method_type,
        provider: None,
        is_default: false,
        card_last4: None,
        card_brand: None,
        upi_id: None,
    }
}

/// Shipping method 1, flat 40.
#[must_use]
pub fn standard_shipping() -> ShippingMethod {
    ShippingMethod {
        id: ShippingMethodId::new(1),
        name: "Standard".to_string(),
        description: None,
        price: Decimal::new(40, 0),
        estimated_days: Some("3-5".to_string()),
    }
}

#[must_use]
pub fn address_id() -> AddressId {
    AddressId::new(1)
}

/// Address 1, standard shipping and `payment_method`.
#[must_use]
pub fn selection(payment_method: PaymentMethod) -> CheckoutSelection {
    CheckoutSelection {
        address_id: Some(address_id()),
        shipping_method: Some(standard_shipping()),
        payment_method: Some(payment_method),
    }
}

#[must_use]
pub fn item(id: i32, price: i64, quantity: u32) -> CartItem {
    CartItem {
        id: ProductId::new(id),
        name: format!("Item {id}"),
        price: Decimal::new(price, 0),
        quantity,
        image: None,
    }
}

/// Two of a 250 item, subtotal 500.
#[must_use]
pub fn cart_500() -> Cart {
    Cart::new(vec![item(1, 250, 2)])
}

/// A shopper with every prefill field set.
///
/// # Panics
///
/// Never; the literals are valid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn contact() -> Contact {
    Contact {
        name: Some("Asha Rao".to_string()),
        email: Some(Email::parse("asha@example.com").unwrap()),
        contact: Some(Phone::parse("+91 98450 00000").unwrap()),
    }
}

/// Full checkout of [`cart_500`] with the backend total of 540.
#[must_use]
pub fn request(payment_method: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        selection: selection(payment_method),
        cart: cart_500(),
        contact: contact(),
        summary_total: Some(Decimal::new(540, 0)),
    }
}

/// Storefront settings pointing at `backend`.
///
/// # Panics
///
/// Never in practice; the fake's URL is always valid.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn storefront_config(backend: &FakeBackend) -> StorefrontConfig {
    StorefrontConfig {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        backend: BackendConfig::new(&backend.base_url()).unwrap(),
        gateway: GatewayConfig {
            key_id: KEY_ID.to_string(),
            script_url: backend.script_url(),
        },
        checkout: CheckoutConfig::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}
