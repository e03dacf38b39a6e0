//! Order placement.

use kirana_core::{AddressId, OrderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::backend::{ApiError, BackendClient, OrderRequest, PaymentMethod, ShippingMethod};

/// The shopper's current choices on the checkout page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub address_id: Option<AddressId>,
    pub shipping_method: Option<ShippingMethod>,
    pub payment_method: Option<PaymentMethod>,
}

impl CheckoutSelection {
    /// Build the order request, or name the first missing choice.
    ///
    /// # Errors
    ///
    /// Returns the first selection that is not set.
    pub fn order_request(&self) -> Result<OrderRequest, MissingSelection> {
        let shipping_address_id = self.address_id.ok_or(MissingSelection::Address)?;
        let shipping_method = self
            .shipping_method
            .as_ref()
            .ok_or(MissingSelection::ShippingMethod)?;
        let payment_method = self
            .payment_method
            .as_ref()
            .ok_or(MissingSelection::PaymentMethod)?;

        Ok(OrderRequest {
            shipping_address_id,
            shipping_method_id: shipping_method.id,
            payment_method_id: payment_method.id,
        })
    }
}

/// A checkout choice the shopper has not made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum MissingSelection {
    #[error("Please select a shipping address")]
    Address,
    #[error("Please select a shipping method")]
    ShippingMethod,
    #[error("Please select a payment method")]
    PaymentMethod,
}

/// A successfully placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    /// Payment page for the order, set when the gateway must be used.
    pub redirect_url: Option<String>,
}

impl PlacedOrder {
    #[must_use]
    pub fn requires_gateway(&self) -> bool {
        self.payment_method.uses_hosted_gateway()
    }
}

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    #[error("missing selection: {0:?}")]
    MissingSelection(MissingSelection),

    #[error("order rejected: {}", .detail.as_deref().unwrap_or("no detail"))]
    Validation { detail: Option<String> },

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("order placement failed: {0}")]
    Failed(String),
}

impl PlaceOrderError {
    /// Message to show the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingSelection(which) => which.to_string(),
            Self::Validation {
                detail: Some(detail),
            } => detail.clone(),
            Self::Validation { detail: None } => {
                "Your order could not be placed. Please check your details.".to_owned()
            }
            Self::AuthenticationRequired => "Please sign in to place your order.".to_owned(),
            Self::Failed(_) => "Failed to place order. Please try again.".to_owned(),
        }
    }
}

impl From<MissingSelection> for PlaceOrderError {
    fn from(missing: MissingSelection) -> Self {
        Self::MissingSelection(missing)
    }
}

impl From<ApiError> for PlaceOrderError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Validation { detail } => Self::Validation { detail },
            ApiError::Unauthorized => Self::AuthenticationRequired,
            other => Self::Failed(other.to_string()),
        }
    }
}

/// Places orders with the backend.
#[derive(Debug, Clone)]
pub struct OrderPlacer {
    backend: BackendClient,
    payment_page: String,
}

impl OrderPlacer {
    #[must_use]
    pub fn new(backend: BackendClient, payment_page: impl Into<String>) -> Self {
        Self {
            backend,
            payment_page: payment_page.into(),
        }
    }

    /// Place an order for the current selection.
    ///
    /// Makes no backend call unless every selection is present.
    ///
    /// # Errors
    ///
    /// See [`PlaceOrderError`].
    #[instrument(skip(self, selection))]
    pub async fn place_order(
        &self,
        selection: &CheckoutSelection,
    ) -> Result<PlacedOrder, PlaceOrderError> {
        let request = selection.order_request()?;
        // order_request succeeded, so the payment method is set
        let Some(payment_method) = selection.payment_method.clone() else {
            return Err(MissingSelection::PaymentMethod.into());
        };

        let order_id = self.backend.place_order(&request).await.map_err(|e| {
            warn!(error = %e, "Order placement failed");
            PlaceOrderError::from(e)
        })?;

        let redirect_url = payment_method
            .uses_hosted_gateway()
            .then(|| self.payment_url(order_id));

        info!(%order_id, method = %payment_method.method_type, "Order placed");
        Ok(PlacedOrder {
            order_id,
            payment_method,
            redirect_url,
        })
    }

    /// `<payment_page>?order_id=<id>`.
    #[must_use]
    pub fn payment_url(&self, order_id: OrderId) -> String {
        format!("{}?order_id={order_id}", self.payment_page)
    }
}
