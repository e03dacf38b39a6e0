//! Status enums for orders, payments and payment methods.

use serde::{Deserialize, Serialize};

/// Payment status of a placed order, as reported to the shopper.
///
/// `Paid` is only reachable through a verified and recorded gateway payment.
/// Pay-on-delivery orders stay `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Order placed, no money captured yet.
    #[default]
    Pending,
    /// Gateway payment verified and recorded.
    Paid,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
        }
    }
}

/// Kind of a saved payment method.
///
/// The backend is not consistent about naming, so a few aliases are accepted
/// when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Card,
    Upi,
    Wallet,
    /// Hosted third-party gateway (Razorpay).
    #[serde(alias = "razorpay")]
    Gateway,
    #[serde(alias = "cod", alias = "cash_on_delivery")]
    CashOnDelivery,
}

impl PaymentMethodKind {
    /// Whether paying with this method goes through the hosted gateway UI.
    #[must_use]
    pub const fn uses_hosted_gateway(self) -> bool {
        matches!(self, Self::Gateway)
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Card => "card",
            Self::Upi => "upi",
            Self::Wallet => "wallet",
            Self::Gateway => "gateway",
            Self::CashOnDelivery => "cash_on_delivery",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_method_kind_aliases() {
        let kind: PaymentMethodKind = serde_json::from_str("\"razorpay\"").unwrap();
        assert_eq!(kind, PaymentMethodKind::Gateway);

        let kind: PaymentMethodKind = serde_json::from_str("\"cod\"").unwrap();
        assert_eq!(kind, PaymentMethodKind::CashOnDelivery);
    }

    #[test]
    fn test_only_gateway_uses_hosted_ui() {
        assert!(PaymentMethodKind::Gateway.uses_hosted_gateway());
        assert!(!PaymentMethodKind::CashOnDelivery.uses_hosted_gateway());
        assert!(!PaymentMethodKind::Card.uses_hosted_gateway());
    }

    #[test]
    fn test_payment_status_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Pending).unwrap(),
            "\"pending\""
        );
    }
}
