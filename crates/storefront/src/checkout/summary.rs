//! Checkout summary: subtotal, shipping, tax and total.
//!
//! The backend owns the numbers. The cart subtotal is computed locally as a
//! fallback so the page still shows something when the backend summary fails,
//! but shipping, tax and total are then reported as unavailable rather than
//! zero, so the shopper never sees a total lower than the real one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use kirana_core::ShippingMethodId;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use super::cart::Cart;
use crate::backend::{BackendClient, CheckoutSummary};

const SUMMARY_UNAVAILABLE: &str = "Could not calculate shipping and tax. Please try again.";

/// Summary as shown on the checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    pub shipping_method_id: ShippingMethodId,
    pub subtotal: Decimal,
    /// `None` means unavailable, not free.
    pub shipping: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SummaryView {
    fn from_backend(shipping_method_id: ShippingMethodId, summary: CheckoutSummary) -> Self {
        Self {
            shipping_method_id,
            subtotal: summary.subtotal,
            shipping: Some(summary.shipping),
            tax: Some(summary.tax),
            total: Some(summary.total),
            error: None,
        }
    }

    fn fallback(shipping_method_id: ShippingMethodId, subtotal: Decimal) -> Self {
        Self {
            shipping_method_id,
            subtotal,
            shipping: None,
            tax: None,
            total: None,
            error: Some(SUMMARY_UNAVAILABLE.to_owned()),
        }
    }

    /// The backend's total, if this view came from the backend.
    #[must_use]
    pub fn authoritative_total(&self) -> Option<Decimal> {
        self.error.is_none().then_some(self.total).flatten()
    }
}

#[derive(Debug, Default)]
struct SummaryState {
    last_shipping_method: Option<ShippingMethodId>,
    view: Option<SummaryView>,
}

/// Recomputes the summary when the shipping method changes.
#[derive(Debug)]
pub struct CheckoutSummaryCalculator {
    backend: BackendClient,
    state: Mutex<SummaryState>,
}

impl CheckoutSummaryCalculator {
    #[must_use]
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            state: Mutex::new(SummaryState::default()),
        }
    }

    /// Recompute for `shipping_method_id`.
    ///
    /// Returns `None` without any backend call when no shipping method is
    /// selected or the method has not changed since the last recompute.
    #[instrument(skip(self, cart))]
    pub async fn recompute(
        &self,
        shipping_method_id: Option<ShippingMethodId>,
        cart: &Cart,
    ) -> Option<SummaryView> {
        let shipping_method_id = shipping_method_id?;
        {
            let mut state = self.lock();
            if state.last_shipping_method == Some(shipping_method_id) {
                return None;
            }
            state.last_shipping_method = Some(shipping_method_id);
        }

        let fallback_subtotal = cart.subtotal();
        let view = match self.backend.cart_summary(shipping_method_id).await {
            Ok(summary) => SummaryView::from_backend(shipping_method_id, summary),
            Err(e) => {
                warn!(error = %e, %shipping_method_id, "Checkout summary unavailable, using cart subtotal");
                SummaryView::fallback(shipping_method_id, fallback_subtotal)
            }
        };

        let mut state = self.lock();
        // A newer recompute may have started while this one was in flight.
        if state.last_shipping_method == Some(shipping_method_id) {
            state.view = Some(view.clone());
        }
        Some(view)
    }

    /// The last computed summary.
    #[must_use]
    pub fn current(&self) -> Option<SummaryView> {
        self.lock().view.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SummaryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
