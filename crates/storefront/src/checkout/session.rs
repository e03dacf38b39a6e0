//! Checkout sessions.
//!
//! A session is the server-side stand-in for one open checkout page: the
//! shopper's cart, their choices, the summary and one orchestrator. Sessions
//! are kept in a `moka` cache and expire after a period without access. An
//! expiring session closes its open payment window, if it has one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use kirana_core::{AddressId, Contact, OrderId, PaymentMethodId, ShippingMethodId};
use moka::future::Cache;
use moka::notification::RemovalCause;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::cart::{Cart, CartItem};
use super::gateway::{GatewayClient, HostedCheckout};
use super::orchestrator::{
    CheckoutOrchestrator, CheckoutRequest, CheckoutRun, CheckoutSettings, CheckoutState,
    CheckoutStatus, ResumeRequest, SubmitRejected,
};
use super::placer::{CheckoutSelection, MissingSelection, OrderPlacer};
use super::recorder::PaymentRecorder;
use super::sdk::SdkLoader;
use super::summary::{CheckoutSummaryCalculator, SummaryView};
use crate::backend::{ApiError, BackendClient};

/// Choices sent by the page. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectionUpdate {
    #[serde(default)]
    pub address_id: Option<AddressId>,
    #[serde(default)]
    pub shipping_method_id: Option<ShippingMethodId>,
    #[serde(default)]
    pub payment_method_id: Option<PaymentMethodId>,
}

/// Errors from applying a [`SelectionUpdate`].
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("unknown shipping method {0}")]
    UnknownShippingMethod(ShippingMethodId),

    #[error("unknown payment method {0}")]
    UnknownPaymentMethod(PaymentMethodId),

    #[error(transparent)]
    Backend(#[from] ApiError),
}

/// Everything the checkout page renders.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub items: Vec<CartItem>,
    pub selection: CheckoutSelection,
    pub summary: Option<SummaryView>,
    pub status: CheckoutStatus,
    pub created_at: DateTime<Utc>,
}

/// One open checkout.
pub struct CheckoutSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    backend: BackendClient,
    cart: Cart,
    contact: Contact,
    selection: Mutex<CheckoutSelection>,
    summary: CheckoutSummaryCalculator,
    orchestrator: CheckoutOrchestrator,
}

impl CheckoutSession {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub const fn orchestrator(&self) -> &CheckoutOrchestrator {
        &self.orchestrator
    }

    #[must_use]
    pub fn selection(&self) -> CheckoutSelection {
        self.lock_selection().clone()
    }

    #[must_use]
    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            items: self.cart.items(),
            selection: self.selection(),
            summary: self.summary.current(),
            status: self.orchestrator.status(),
            created_at: self.created_at,
        }
    }

    /// Apply the page's choices, recomputing the summary when the shipping
    /// method changes.
    ///
    /// # Errors
    ///
    /// Returns an error if an id is not one the backend offers, or the option
    /// lists cannot be fetched.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn update_selection(
        &self,
        update: SelectionUpdate,
    ) -> Result<Option<SummaryView>, SelectionError> {
        let shipping_method = match update.shipping_method_id {
            Some(id) => Some(
                self.backend
                    .shipping_methods()
                    .await?
                    .into_iter()
                    .find(|method| method.id == id)
                    .ok_or(SelectionError::UnknownShippingMethod(id))?,
            ),
            None => None,
        };
        let payment_method = match update.payment_method_id {
            Some(id) => Some(
                self.backend
                    .payment_methods()
                    .await?
                    .into_iter()
                    .find(|method| method.id == id)
                    .ok_or(SelectionError::UnknownPaymentMethod(id))?,
            ),
            None => None,
        };

        let shipping_method_id = {
            let mut selection = self.lock_selection();
            if let Some(address_id) = update.address_id {
                selection.address_id = Some(address_id);
            }
            if let Some(method) = shipping_method {
                selection.shipping_method = Some(method);
            }
            if let Some(method) = payment_method {
                selection.payment_method = Some(method);
            }
            selection.shipping_method.as_ref().map(|method| method.id)
        };

        Ok(self.summary.recompute(shipping_method_id, &self.cart).await)
    }

    /// Start a full checkout with the current choices.
    ///
    /// # Errors
    ///
    /// See [`CheckoutOrchestrator::submit`].
    pub fn submit(&self) -> Result<CheckoutRun, SubmitRejected> {
        let selection = self.selection();
        let summary_total = self.summary_total(&selection);
        self.orchestrator.submit(CheckoutRequest {
            selection,
            cart: self.cart.clone(),
            contact: self.contact.clone(),
            summary_total,
        })
    }

    /// Start payment for `order_id`, placed earlier with this session's
    /// choices.
    ///
    /// # Errors
    ///
    /// Returns `Missing` without a payment method, else see
    /// [`CheckoutOrchestrator::resume`].
    pub fn resume(&self, order_id: OrderId) -> Result<CheckoutRun, SubmitRejected> {
        let selection = self.selection();
        let payment_method_id = selection
            .payment_method
            .as_ref()
            .map(|method| method.id)
            .ok_or(MissingSelection::PaymentMethod)?;
        let request = CheckoutRequest {
            summary_total: self.summary_total(&selection),
            selection,
            cart: self.cart.clone(),
            contact: self.contact.clone(),
        };
        self.orchestrator.resume(ResumeRequest {
            order_id,
            amount: request.amount(),
            payment_method_id,
            cart: request.cart,
            contact: request.contact,
        })
    }

    /// Backend total for the selected shipping method, if known.
    fn summary_total(&self, selection: &CheckoutSelection) -> Option<rust_decimal::Decimal> {
        let shipping_method_id = selection.shipping_method.as_ref()?.id;
        self.summary
            .current()
            .filter(|view| view.shipping_method_id == shipping_method_id)
            .and_then(|view| view.authoritative_total())
    }

    /// Gateway order whose payment window is waiting on the shopper, if any.
    fn open_payment_window(&self) -> Option<String> {
        let status = self.orchestrator.status();
        (status.state == CheckoutState::AwaitingUserPayment)
            .then_some(status.gateway_order_id)
            .flatten()
    }

    fn lock_selection(&self) -> MutexGuard<'_, CheckoutSelection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("id", &self.id)
            .field("state", &self.orchestrator.status().state)
            .finish_non_exhaustive()
    }
}

/// Registry of open checkout sessions.
#[derive(Clone)]
pub struct CheckoutSessions {
    backend: BackendClient,
    sdk: Arc<SdkLoader>,
    hosted: Arc<dyn HostedCheckout>,
    settings: CheckoutSettings,
    sessions: Cache<Uuid, Arc<CheckoutSession>>,
}

impl CheckoutSessions {
    #[must_use]
    pub fn new(
        backend: BackendClient,
        sdk: Arc<SdkLoader>,
        hosted: Arc<dyn HostedCheckout>,
        settings: CheckoutSettings,
    ) -> Self {
        let closer = Arc::clone(&hosted);
        let sessions = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(settings.checkout.session_ttl)
            .eviction_listener(
                move |id: Arc<Uuid>, session: Arc<CheckoutSession>, cause: RemovalCause| {
                    // Dropping the window's handlers ends the run waiting on it.
                    if let Some(gateway_order_id) = session.open_payment_window() {
                        closer.close(&gateway_order_id);
                        info!(
                            session = %id,
                            gateway_order_id = %gateway_order_id,
                            ?cause,
                            "Closed payment window of evicted session"
                        );
                    } else {
                        debug!(session = %id, ?cause, "Checkout session evicted");
                    }
                },
            )
            .build();
        Self {
            backend,
            sdk,
            hosted,
            settings,
            sessions,
        }
    }

    /// Open a session for `items`, forwarding `token` to the backend.
    pub async fn open(
        &self,
        items: Vec<CartItem>,
        contact: Contact,
        token: Option<SecretString>,
    ) -> Arc<CheckoutSession> {
        let backend = match token {
            Some(token) => self.backend.authenticated(token),
            None => self.backend.clone(),
        };
        let gateway = GatewayClient::new(backend.clone())
            .with_sdk(Arc::clone(&self.sdk))
            .with_hosted(Arc::clone(&self.hosted));
        let orchestrator = CheckoutOrchestrator::new(
            OrderPlacer::new(backend.clone(), self.settings.checkout.payment_page.clone()),
            gateway,
            PaymentRecorder::new(backend.clone()),
            self.settings.clone(),
        );

        let session = Arc::new(CheckoutSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            summary: CheckoutSummaryCalculator::new(backend.clone()),
            backend,
            cart: Cart::new(items),
            contact,
            selection: Mutex::new(CheckoutSelection::default()),
            orchestrator,
        });

        self.sessions.insert(session.id, Arc::clone(&session)).await;
        info!(session = %session.id, items = session.cart.item_count(), "Checkout session opened");
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<CheckoutSession>> {
        self.sessions.get(&id).await
    }

    /// Evict expired sessions now instead of on a later cache access.
    pub async fn purge_expired(&self) {
        self.sessions.run_pending_tasks().await;
    }
}

impl std::fmt::Debug for CheckoutSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutSessions")
            .field("count", &self.sessions.entry_count())
            .finish_non_exhaustive()
    }
}
