//! Payment gateway client.
//!
//! Wraps the three things checkout needs from the gateway:
//!
//! - the checkout script, loaded once ([`GatewayClient::load_sdk`])
//! - gateway orders and signature verification, both via the backend
//! - the hosted payment UI, reached through an injected [`HostedCheckout`]
//!
//! None of these fail the caller. Backend errors become `None`/`false` and are
//! logged here, and a hosted UI that cannot be opened is logged and skipped.

use std::sync::Arc;

use kirana_core::{Contact, CurrencyCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, instrument, warn};

use crate::backend::{BackendClient, GatewayOrder, GatewayOrderRequest, VerifyPaymentRequest};
use crate::checkout::sdk::SdkLoader;

/// Called with the gateway's response when the shopper completes payment.
pub type SuccessHandler = Box<dyn FnOnce(GatewaySuccessResponse) + Send>;

/// Called when the shopper closes the hosted UI without paying.
pub type DismissHandler = Box<dyn FnOnce() + Send>;

/// What the hosted UI reports after a successful payment.
///
/// Untrusted until verified by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySuccessResponse {
    #[serde(rename = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(rename = "razorpay_order_id")]
    pub order_id: String,
    #[serde(rename = "razorpay_signature")]
    pub signature: String,
}

/// A gateway response whose signature the backend has confirmed.
///
/// Only [`GatewayClient::verify`] creates these, so holding one is proof that
/// verification succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    response: GatewaySuccessResponse,
}

impl VerifiedPayment {
    #[must_use]
    pub fn payment_id(&self) -> &str {
        &self.response.payment_id
    }

    #[must_use]
    pub fn gateway_order_id(&self) -> &str {
        &self.response.order_id
    }

    #[must_use]
    pub fn signature(&self) -> &str {
        &self.response.signature
    }
}

/// Prefill block of the hosted UI options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl From<&Contact> for Prefill {
    fn from(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            email: contact.email.as_ref().map(|e| e.as_str().to_owned()),
            contact: contact.contact.as_ref().map(|p| p.as_str().to_owned()),
        }
    }
}

/// Theme block of the hosted UI options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub color: String,
}

/// The serializable part of [`CheckoutOptions`], in the shape the hosted
/// widget expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetOptions {
    pub key: String,
    /// Minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub order_id: String,
    pub prefill: Prefill,
    pub theme: Theme,
}

/// Everything needed to open the hosted payment UI once.
pub struct CheckoutOptions {
    pub widget: WidgetOptions,
    pub handler: SuccessHandler,
    pub on_dismiss: DismissHandler,
}

impl std::fmt::Debug for CheckoutOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutOptions")
            .field("widget", &self.widget)
            .finish_non_exhaustive()
    }
}

/// Errors a hosted UI can report when asked to open.
#[derive(Debug, Error)]
pub enum HostedCheckoutError {
    #[error("a payment window is already open for gateway order {0}")]
    AlreadyOpen(String),

    #[error("hosted checkout unavailable: {0}")]
    Unavailable(String),
}

/// The hosted payment UI.
///
/// Implementations must eventually call exactly one of the two handlers in
/// [`CheckoutOptions`], or drop both.
pub trait HostedCheckout: Send + Sync {
    /// Show the payment UI.
    ///
    /// # Errors
    ///
    /// Returns an error if the UI cannot be shown; the options are dropped.
    fn open(&self, options: CheckoutOptions) -> Result<(), HostedCheckoutError>;

    /// Forget an open payment UI whose outcome is no longer awaited.
    fn close(&self, _gateway_order_id: &str) {}
}

/// Client for the gateway side of checkout.
#[derive(Clone)]
pub struct GatewayClient {
    backend: BackendClient,
    sdk: Option<Arc<SdkLoader>>,
    hosted: Option<Arc<dyn HostedCheckout>>,
}

impl GatewayClient {
    /// A client that can create orders and verify signatures, but cannot open
    /// a payment UI until an SDK and hosted UI are attached.
    #[must_use]
    pub const fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            sdk: None,
            hosted: None,
        }
    }

    #[must_use]
    pub fn with_sdk(mut self, sdk: Arc<SdkLoader>) -> Self {
        self.sdk = Some(sdk);
        self
    }

    #[must_use]
    pub fn with_hosted(mut self, hosted: Arc<dyn HostedCheckout>) -> Self {
        self.hosted = Some(hosted);
        self
    }

    /// Load the checkout script. Returns `false` instead of failing.
    pub async fn load_sdk(&self) -> bool {
        let Some(sdk) = &self.sdk else {
            warn!("No checkout script configured");
            return false;
        };
        match sdk.load().await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, url = %sdk.url(), "Failed to load checkout script");
                false
            }
        }
    }

    /// Create a gateway order for `amount` (major units).
    ///
    /// Returns `None` on any backend failure, or when the gateway's order is
    /// not for `amount` in `currency`.
    #[instrument(skip(self, notes))]
    pub async fn create_gateway_order(
        &self,
        amount: Decimal,
        currency: CurrencyCode,
        receipt: &str,
        notes: serde_json::Map<String, serde_json::Value>,
    ) -> Option<GatewayOrder> {
        let request = GatewayOrderRequest {
            amount,
            currency,
            receipt: receipt.to_owned(),
            notes,
        };
        match self.backend.create_gateway_order(&request).await {
            Ok(order)
                if order.currency == currency
                    && currency.to_minor_units(amount) == Some(order.amount) =>
            {
                Some(order)
            }
            Ok(order) => {
                error!(
                    gateway_order_id = %order.id,
                    requested = %amount,
                    charged = %order.currency.from_minor_units(order.amount),
                    currency = %order.currency,
                    receipt,
                    "Gateway order amount does not match the checkout"
                );
                None
            }
            Err(e) => {
                error!(error = %e, receipt, "Failed to create gateway order");
                None
            }
        }
    }

    /// Ask the backend whether a signature is authentic.
    ///
    /// `true` only when the backend answers `verified: true`; every error is
    /// `false`.
    #[instrument(skip(self, signature))]
    pub async fn verify_signature(
        &self,
        payment_id: &str,
        gateway_order_id: &str,
        signature: &str,
    ) -> bool {
        let request = VerifyPaymentRequest {
            razorpay_payment_id: payment_id.to_owned(),
            razorpay_order_id: gateway_order_id.to_owned(),
            razorpay_signature: signature.to_owned(),
        };
        match self.backend.verify_payment(&request).await {
            Ok(response) => response.verified == Some(true),
            Err(e) => {
                warn!(error = %e, "Signature verification request failed");
                false
            }
        }
    }

    /// Verify a hosted UI response, upgrading it to a [`VerifiedPayment`].
    pub async fn verify(&self, response: GatewaySuccessResponse) -> Option<VerifiedPayment> {
        self.verify_signature(&response.payment_id, &response.order_id, &response.signature)
            .await
            .then_some(VerifiedPayment { response })
    }

    /// Open the hosted payment UI. Never fails the caller.
    ///
    /// When the UI cannot be opened, the options (and both handlers) are
    /// dropped.
    pub fn open_checkout(&self, options: CheckoutOptions) {
        let gateway_order_id = options.widget.order_id.clone();

        let Some(hosted) = &self.hosted else {
            warn!(%gateway_order_id, "No hosted checkout available, payment window not opened");
            return;
        };

        if !self.sdk.as_ref().is_some_and(|sdk| sdk.is_loaded()) {
            warn!(%gateway_order_id, "Checkout script not loaded, payment window not opened");
            return;
        }

        if let Err(e) = hosted.open(options) {
            error!(error = %e, %gateway_order_id, "Hosted checkout failed to open");
        }
    }

    /// Tell the hosted UI an attempt is over.
    pub fn close_checkout(&self, gateway_order_id: &str) {
        if let Some(hosted) = &self.hosted {
            hosted.close(gateway_order_id);
        }
    }
}
