//! `kirana-cli reconcile`.
//!
//! Records a payment the storefront failed to record after the gateway had
//! already charged the shopper. The storefront logs these at error level with
//! every value this command needs. The signature is verified first; an
//! unverified payment is never recorded.

use kirana_core::{CurrencyCode, OrderId, PaymentMethodId};
use kirana_storefront::checkout::{
    GatewayClient, GatewaySuccessResponse, PaymentDetails, PaymentRecorder,
};
use rust_decimal::Decimal;

use super::{CliError, Context, print_json};

/// A gateway payment to reconcile.
#[derive(Debug)]
pub struct Reconciliation {
    pub order_id: OrderId,
    pub payment_method_id: PaymentMethodId,
    /// Major units.
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub payment_id: String,
    pub gateway_order_id: String,
    pub signature: String,
}

/// Verify, then record.
pub async fn run(ctx: &Context, reconciliation: Reconciliation) -> Result<(), CliError> {
    let gateway = GatewayClient::new(ctx.backend.clone());
    let payment_id = reconciliation.payment_id.clone();

    let verified = gateway
        .verify(GatewaySuccessResponse {
            payment_id: reconciliation.payment_id,
            order_id: reconciliation.gateway_order_id,
            signature: reconciliation.signature,
        })
        .await
        .ok_or_else(|| CliError::NotVerified(payment_id.clone()))?;

    let recorder = PaymentRecorder::new(ctx.backend.clone());
    let order_id = reconciliation.order_id;
    let payment = recorder
        .record_payment(
            &verified,
            PaymentDetails {
                amount: reconciliation.amount,
                currency: reconciliation.currency,
                order_id,
                payment_method_id: reconciliation.payment_method_id,
                description: format!("Manual reconciliation for order {order_id}"),
            },
        )
        .await
        .ok_or(CliError::RecordFailed(payment_id))?;

    tracing::info!(payment = %payment.id, %order_id, "Payment reconciled");
    print_json(&payment)
}
