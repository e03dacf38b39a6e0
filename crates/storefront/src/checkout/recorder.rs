//! Persisting verified payments.

use chrono::Utc;
use kirana_core::{CurrencyCode, OrderId, PaymentMethodId};
use rust_decimal::Decimal;
use tracing::{error, info, instrument};

use super::gateway::VerifiedPayment;
use crate::backend::{BackendClient, NewPayment, Payment, PaymentMetadata};

/// Gateway name stored on every payment record.
pub const GATEWAY_NAME: &str = "razorpay";

/// Status string stored in payment metadata.
const CAPTURED: &str = "captured";

/// Order-side details of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    /// Major units.
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub order_id: OrderId,
    pub payment_method_id: PaymentMethodId,
    pub description: String,
}

/// Records payments against orders.
#[derive(Debug, Clone)]
pub struct PaymentRecorder {
    backend: BackendClient,
}

impl PaymentRecorder {
    #[must_use]
    pub const fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Record a verified payment.
    ///
    /// Returns `None` if the backend rejects the record. Money has already
    /// moved at the gateway by then, so the failure is logged at error level
    /// with the gateway identifiers for manual reconciliation.
    #[instrument(
        skip(self, verified, details),
        fields(
            order_id = %details.order_id,
            gateway_order_id = verified.gateway_order_id(),
            gateway_payment_id = verified.payment_id(),
        )
    )]
    pub async fn record_payment(
        &self,
        verified: &VerifiedPayment,
        details: PaymentDetails,
    ) -> Option<Payment> {
        let payment = new_payment(verified, details);
        match self.backend.record_payment(&payment).await {
            Ok(recorded) => {
                info!(payment_id = %recorded.id, "Payment recorded");
                Some(recorded)
            }
            Err(e) => {
                error!(
                    error = %e,
                    order_id = %payment.order_id,
                    amount = %payment.amount,
                    currency = %payment.currency,
                    gateway_order_id = %payment.gateway_order_id,
                    gateway_payment_id = %payment.gateway_payment_id,
                    "Unreconciled gateway charge: verified payment could not be recorded"
                );
                None
            }
        }
    }
}

fn new_payment(verified: &VerifiedPayment, details: PaymentDetails) -> NewPayment {
    NewPayment {
        amount: details.amount,
        currency: details.currency,
        order_id: details.order_id,
        payment_method_id: details.payment_method_id,
        gateway: GATEWAY_NAME.to_owned(),
        description: details.description,
        gateway_order_id: verified.gateway_order_id().to_owned(),
        gateway_payment_id: verified.payment_id().to_owned(),
        gateway_signature: verified.signature().to_owned(),
        is_installment: false,
        is_recurring: false,
        metadata: PaymentMetadata {
            payment_time: Utc::now(),
            status: CAPTURED.to_owned(),
            gateway_order_id: verified.gateway_order_id().to_owned(),
        },
    }
}
