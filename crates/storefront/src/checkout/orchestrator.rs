//! Checkout state machine.
//!
//! # States
//!
//! ```text
//! Idle -> Placing -> AwaitingGatewayOrder -> AwaitingUserPayment -> Verifying -> Recording -> Succeeded
//!            |              |                     |      |              |            |
//!            |              |                     |      +-> Cancelled  |            |
//!            +--------------+---------------------+---------------------+------------+-> Failed
//! ```
//!
//! Pay-on-delivery orders go from `Placing` straight to `Succeeded` with
//! payment status `pending`.
//!
//! # Usage
//!
//! [`CheckoutOrchestrator::submit`] checks the guard and moves to `Placing`
//! synchronously, returning a [`CheckoutRun`]. The caller then drives the run,
//! typically on a spawned task, while reading progress through
//! [`CheckoutOrchestrator::status`] or [`CheckoutOrchestrator::subscribe`].
//!
//! The current status lives in a `watch` channel. The guard and the first
//! transition happen inside one `send_if_modified` call, so two submits can
//! never both start a sequence.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use kirana_core::{Contact, OrderId, PaymentMethodId, PaymentStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, instrument, warn};

use super::cart::Cart;
use super::gateway::{
    CheckoutOptions, GatewayClient, GatewaySuccessResponse, Prefill, Theme, WidgetOptions,
};
use super::placer::{CheckoutSelection, MissingSelection, OrderPlacer};
use super::recorder::{PaymentDetails, PaymentRecorder};
use crate::backend::{GatewayOrder, Payment};
use crate::config::{CheckoutConfig, StorefrontConfig};

// =============================================================================
// Status
// =============================================================================

/// Where a checkout is in its sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    Placing,
    AwaitingGatewayOrder,
    AwaitingUserPayment,
    Verifying,
    Recording,
    Succeeded,
    Failed,
    Cancelled,
}

impl CheckoutState {
    /// Whether a new sequence may start from this state.
    #[must_use]
    pub const fn accepts_submit(self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Cancelled)
    }
}

/// Which step a failed checkout failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    OrderPlacement,
    GatewayOrder,
    PaymentWindowUnavailable,
    Verification,
    /// The gateway charged the shopper but no payment record exists.
    Recording,
}

/// Snapshot of a checkout, as shown to the shopper.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckoutStatus {
    pub state: CheckoutState,
    pub message: Option<String>,
    pub failure: Option<FailureCause>,
    pub order_id: Option<OrderId>,
    pub gateway_order_id: Option<String>,
    /// Payment page for the placed order, when it needs the gateway.
    pub redirect_url: Option<String>,
    pub payment: Option<Payment>,
    pub payment_status: Option<PaymentStatus>,
    /// Set on `Succeeded` and `Failed` until the shopper acknowledges.
    pub requires_acknowledgement: bool,
    /// Number of sequences started.
    pub attempt: u32,
}

impl CheckoutStatus {
    /// Reset per-attempt fields for a new sequence.
    fn begin(&mut self, state: CheckoutState) {
        *self = Self {
            state,
            attempt: self.attempt + 1,
            ..Self::default()
        };
    }
}

/// Result of acknowledging the success or failure message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    /// Where to navigate next, if anywhere.
    pub redirect: Option<String>,
}

/// Why a sequence was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejected {
    #[error(transparent)]
    Missing(#[from] MissingSelection),

    #[error("a checkout is already in progress ({0:?})")]
    Busy(CheckoutState),
}

// =============================================================================
// Inputs
// =============================================================================

/// Static settings for every checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Public gateway key handed to the hosted UI.
    pub key_id: String,
    pub checkout: CheckoutConfig,
}

impl CheckoutSettings {
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Self {
        Self {
            key_id: config.gateway.key_id.clone(),
            checkout: config.checkout.clone(),
        }
    }
}

/// Everything a full checkout needs from the page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub selection: CheckoutSelection,
    pub cart: Cart,
    pub contact: Contact,
    /// Backend summary total, when one is available.
    pub summary_total: Option<Decimal>,
}

impl CheckoutRequest {
    /// Amount to charge: the backend total, else cart subtotal plus shipping.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.summary_total.unwrap_or_else(|| {
            let shipping = self
                .selection
                .shipping_method
                .as_ref()
                .map_or(Decimal::ZERO, |method| method.price);
            self.cart.subtotal() + shipping
        })
    }
}

/// Payment for an order that already exists.
#[derive(Debug, Clone)]
pub struct ResumeRequest {
    pub order_id: OrderId,
    /// Major units.
    pub amount: Decimal,
    pub payment_method_id: PaymentMethodId,
    pub cart: Cart,
    pub contact: Contact,
}

// =============================================================================
// CheckoutOrchestrator
// =============================================================================

/// Sequences order placement, payment and recording for one checkout.
///
/// Cheap to clone; clones share the same status.
#[derive(Clone)]
pub struct CheckoutOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    placer: OrderPlacer,
    gateway: GatewayClient,
    recorder: PaymentRecorder,
    settings: CheckoutSettings,
    status: watch::Sender<CheckoutStatus>,
}

impl CheckoutOrchestrator {
    #[must_use]
    pub fn new(
        placer: OrderPlacer,
        gateway: GatewayClient,
        recorder: PaymentRecorder,
        settings: CheckoutSettings,
    ) -> Self {
        let (status, _) = watch::channel(CheckoutStatus::default());
        Self {
            inner: Arc::new(OrchestratorInner {
                placer,
                gateway,
                recorder,
                settings,
                status,
            }),
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> CheckoutStatus {
        self.inner.status.borrow().clone()
    }

    /// Receiver that sees every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.inner.status.subscribe()
    }

    /// Start a full checkout.
    ///
    /// On a missing selection the state is left as is and the status message
    /// names the missing choice.
    ///
    /// # Errors
    ///
    /// Returns `Busy` unless the state is `Idle`, `Failed` or `Cancelled`, and
    /// `Missing` if a selection is absent.
    pub fn submit(&self, request: CheckoutRequest) -> Result<CheckoutRun, SubmitRejected> {
        let guard = request.selection.order_request().map(|_| ());
        self.begin(CheckoutState::Placing, guard)?;
        Ok(CheckoutRun {
            orchestrator: self.clone(),
            plan: Plan::Place(request),
        })
    }

    /// Start payment for an order placed earlier.
    ///
    /// # Errors
    ///
    /// Returns `Busy` unless the state is `Idle`, `Failed` or `Cancelled`.
    pub fn resume(&self, request: ResumeRequest) -> Result<CheckoutRun, SubmitRejected> {
        self.begin(CheckoutState::AwaitingGatewayOrder, Ok(()))?;
        let order_id = request.order_id;
        self.update(|status| status.order_id = Some(order_id));
        Ok(CheckoutRun {
            orchestrator: self.clone(),
            plan: Plan::Pay(request),
        })
    }

    /// Dismiss the success or failure message.
    ///
    /// Acknowledging a success returns the confirmation page for the order.
    pub fn acknowledge(&self) -> Acknowledgement {
        let confirmation_page = &self.inner.settings.checkout.confirmation_page;
        let mut ack = Acknowledgement::default();
        self.inner.status.send_if_modified(|status| {
            if !status.requires_acknowledgement {
                return false;
            }
            status.requires_acknowledgement = false;
            if status.state == CheckoutState::Succeeded {
                ack.redirect = status
                    .order_id
                    .map(|id| format!("{confirmation_page}?order_id={id}"));
            }
            true
        });
        ack
    }

    /// Atomically check the re-entrancy guard and the selection guard, then
    /// enter `state`.
    fn begin(
        &self,
        state: CheckoutState,
        guard: Result<(), MissingSelection>,
    ) -> Result<(), SubmitRejected> {
        let mut outcome = Ok(());
        self.inner.status.send_if_modified(|status| {
            if !status.state.accepts_submit() {
                outcome = Err(SubmitRejected::Busy(status.state));
                return false;
            }
            if let Err(missing) = guard {
                status.message = Some(missing.to_string());
                outcome = Err(SubmitRejected::Missing(missing));
                return true;
            }
            status.begin(state);
            true
        });
        if let Err(e) = &outcome {
            info!(reason = %e, "Checkout submit rejected");
        }
        outcome
    }

    fn update(&self, f: impl FnOnce(&mut CheckoutStatus)) {
        self.inner.status.send_modify(f);
    }

    fn enter(&self, state: CheckoutState) {
        info!(?state, "Checkout state changed");
        self.update(|status| status.state = state);
    }

    fn fail(&self, cause: FailureCause, message: impl Into<String>) -> CheckoutState {
        let message = message.into();
        warn!(?cause, %message, "Checkout failed");
        self.update(|status| {
            status.state = CheckoutState::Failed;
            status.failure = Some(cause);
            status.message = Some(message);
            status.requires_acknowledgement = true;
        });
        CheckoutState::Failed
    }

    fn cancel(&self, message: &str) -> CheckoutState {
        info!(%message, "Checkout cancelled");
        self.update(|status| {
            status.state = CheckoutState::Cancelled;
            status.message = Some(message.to_owned());
        });
        CheckoutState::Cancelled
    }

    fn succeed(
        &self,
        cart: &Cart,
        payment: Option<Payment>,
        payment_status: PaymentStatus,
        message: &str,
    ) -> CheckoutState {
        cart.clear();
        info!(%payment_status, "Checkout succeeded");
        self.update(|status| {
            status.state = CheckoutState::Succeeded;
            status.payment = payment;
            status.payment_status = Some(payment_status);
            status.message = Some(message.to_owned());
            status.requires_acknowledgement = true;
        });
        CheckoutState::Succeeded
    }
}

// =============================================================================
// CheckoutRun
// =============================================================================

enum Plan {
    Place(CheckoutRequest),
    Pay(ResumeRequest),
}

/// What the hosted UI reported.
enum HostedOutcome {
    Paid(GatewaySuccessResponse),
    Dismissed,
}

/// An accepted checkout sequence, ready to be driven.
#[must_use = "a checkout run does nothing until executed"]
pub struct CheckoutRun {
    orchestrator: CheckoutOrchestrator,
    plan: Plan,
}

impl CheckoutRun {
    /// Drive the sequence to a terminal state and return it.
    pub async fn execute(self) -> CheckoutState {
        match self.plan {
            Plan::Place(request) => self.orchestrator.place(request).await,
            Plan::Pay(request) => self.orchestrator.pay(request).await,
        }
    }
}

impl CheckoutOrchestrator {
    #[instrument(skip(self, request), fields(attempt = self.status().attempt))]
    async fn place(&self, request: CheckoutRequest) -> CheckoutState {
        let amount = request.amount();
        let placed = match self.inner.placer.place_order(&request.selection).await {
            Ok(placed) => placed,
            Err(e) => return self.fail(FailureCause::OrderPlacement, e.user_message()),
        };

        let order_id = placed.order_id;
        let redirect_url = placed.redirect_url.clone();
        self.update(|status| {
            status.order_id = Some(order_id);
            status.redirect_url = redirect_url;
        });

        if !placed.requires_gateway() {
            return self.succeed(
                &request.cart,
                None,
                PaymentStatus::Pending,
                "Order placed. Pay on delivery.",
            );
        }

        self.enter(CheckoutState::AwaitingGatewayOrder);
        self.pay(ResumeRequest {
            order_id,
            amount,
            payment_method_id: placed.payment_method.id,
            cart: request.cart,
            contact: request.contact,
        })
        .await
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id, amount = %request.amount))]
    async fn pay(&self, request: ResumeRequest) -> CheckoutState {
        let settings = &self.inner.settings.checkout;
        let order_id = request.order_id;

        let mut notes = serde_json::Map::new();
        notes.insert("order_id".to_owned(), order_id.as_i32().into());
        let Some(gateway_order) = self
            .inner
            .gateway
            .create_gateway_order(
                request.amount,
                settings.currency,
                &format!("order_{order_id}"),
                notes,
            )
            .await
        else {
            return self.fail(
                FailureCause::GatewayOrder,
                "Could not start payment. Please try again.",
            );
        };

        let gateway_order_id = gateway_order.id.clone();
        self.update(|status| {
            status.state = CheckoutState::AwaitingUserPayment;
            status.gateway_order_id = Some(gateway_order_id);
        });

        let outcome = self.await_hosted(&gateway_order, &request).await;
        let response = match outcome {
            Some(HostedOutcome::Paid(response)) => response,
            Some(HostedOutcome::Dismissed) => {
                return self.cancel("Payment cancelled. You can try again.");
            }
            None => {
                return self.fail(
                    FailureCause::PaymentWindowUnavailable,
                    "The payment window could not be opened. Please try again.",
                );
            }
        };

        self.enter(CheckoutState::Verifying);
        if response.order_id != gateway_order.id {
            warn!(
                expected = %gateway_order.id,
                received = %response.order_id,
                "Gateway response is for a different gateway order"
            );
            return self.verification_failed();
        }
        let Some(verified) = self.inner.gateway.verify(response).await else {
            return self.verification_failed();
        };

        self.enter(CheckoutState::Recording);
        let details = PaymentDetails {
            amount: request.amount,
            currency: gateway_order.currency,
            order_id,
            payment_method_id: request.payment_method_id,
            description: format!("Payment for order {order_id}"),
        };
        match self.inner.recorder.record_payment(&verified, details).await {
            Some(payment) => self.succeed(
                &request.cart,
                Some(payment),
                PaymentStatus::Paid,
                "Payment successful.",
            ),
            None => self.fail(
                FailureCause::Recording,
                format!(
                    "Your payment was received but could not be saved. \
                     Please contact support with payment reference {}.",
                    verified.payment_id()
                ),
            ),
        }
    }

    fn verification_failed(&self) -> CheckoutState {
        self.fail(
            FailureCause::Verification,
            "Payment could not be verified. If you were charged, please contact support.",
        )
    }

    /// Open the hosted UI and wait for its first callback.
    ///
    /// `None` means both handlers were dropped without firing.
    async fn await_hosted(
        &self,
        gateway_order: &GatewayOrder,
        request: &ResumeRequest,
    ) -> Option<HostedOutcome> {
        let settings = &self.inner.settings;
        // Retries the script fetch if an earlier attempt failed.
        self.inner.gateway.load_sdk().await;

        let (tx, rx) = oneshot::channel();
        // Both handlers share the sender, so only the first callback lands.
        let tx = Arc::new(Mutex::new(Some(tx)));
        let on_success = Arc::clone(&tx);

        let options = CheckoutOptions {
            widget: WidgetOptions {
                key: settings.key_id.clone(),
                amount: gateway_order.amount,
                currency: gateway_order.currency,
                name: settings.checkout.display_name.clone(),
                description: settings.checkout.description.clone(),
                image: settings.checkout.image_url.clone(),
                order_id: gateway_order.id.clone(),
                prefill: Prefill::from(&request.contact),
                theme: Theme {
                    color: settings.checkout.theme_color.clone(),
                },
            },
            handler: Box::new(move |response| {
                deliver(&on_success, HostedOutcome::Paid(response));
            }),
            on_dismiss: Box::new(move || deliver(&tx, HostedOutcome::Dismissed)),
        };
        self.inner.gateway.open_checkout(options);

        match settings.checkout.hosted_timeout {
            Some(limit) => self.await_with_timeout(rx, limit, &gateway_order.id).await,
            None => rx.await.ok(),
        }
    }

    async fn await_with_timeout(
        &self,
        rx: oneshot::Receiver<HostedOutcome>,
        limit: Duration,
        gateway_order_id: &str,
    ) -> Option<HostedOutcome> {
        if let Ok(outcome) = tokio::time::timeout(limit, rx).await {
            outcome.ok()
        } else {
            warn!(gateway_order_id, ?limit, "Payment window timed out");
            self.inner.gateway.close_checkout(gateway_order_id);
            Some(HostedOutcome::Dismissed)
        }
    }
}

fn deliver(slot: &Mutex<Option<oneshot::Sender<HostedOutcome>>>, outcome: HostedOutcome) {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match sender {
        Some(sender) => {
            if sender.send(outcome).is_err() {
                error!("Hosted payment callback arrived after checkout stopped waiting");
            }
        }
        None => warn!("Ignoring repeated hosted payment callback"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kirana_core::{AddressId, PaymentMethodKind, ProductId, ShippingMethodId};

    use super::*;
    use crate::backend::{BackendClient, PaymentMethod, ShippingMethod};
    use crate::checkout::cart::CartItem;
    use crate::config::BackendConfig;

    fn orchestrator() -> CheckoutOrchestrator {
        // Nothing in these tests reaches the network.
        let config = BackendConfig::new("http://127.0.0.1:9/").unwrap();
        let backend = BackendClient::new(&config).unwrap();
        CheckoutOrchestrator::new(
            OrderPlacer::new(backend.clone(), "/checkout/payment"),
            GatewayClient::new(backend.clone()),
            PaymentRecorder::new(backend),
            CheckoutSettings {
                key_id: "rzp_test".to_string(),
                checkout: CheckoutConfig::default(),
            },
        )
    }

    fn request(selection: CheckoutSelection) -> CheckoutRequest {
        CheckoutRequest {
            selection,
            cart: Cart::new(vec![CartItem {
                id: ProductId::new(1),
                name: "Rice".to_string(),
                price: Decimal::new(500, 0),
                quantity: 1,
                image: None,
            }]),
            contact: Contact::default(),
            summary_total: None,
        }
    }

    fn full_selection() -> CheckoutSelection {
        CheckoutSelection {
            address_id: Some(AddressId::new(1)),
            shipping_method: Some(ShippingMethod {
                id: ShippingMethodId::new(1),
                name: "Standard".to_string(),
                description: None,
                price: Decimal::new(40, 0),
                estimated_days: None,
            }),
            payment_method: Some(PaymentMethod {
                id: PaymentMethodId::new(3),
                method_type: PaymentMethodKind::Gateway,
                provider: None,
                is_default: false,
                card_last4: None,
                card_brand: None,
                upi_id: None,
            }),
        }
    }

    #[test]
    fn test_missing_selection_keeps_state() {
        let orchestrator = orchestrator();
        let err = orchestrator
            .submit(request(CheckoutSelection::default()))
            .err()
            .unwrap();
        assert_eq!(err, SubmitRejected::Missing(MissingSelection::Address));

        let status = orchestrator.status();
        assert_eq!(status.state, CheckoutState::Idle);
        assert_eq!(status.attempt, 0);
        assert_eq!(
            status.message.as_deref(),
            Some("Please select a shipping address")
        );
    }

    #[test]
    fn test_second_submit_is_busy() {
        let orchestrator = orchestrator();
        let _run = orchestrator.submit(request(full_selection())).unwrap();
        assert_eq!(orchestrator.status().state, CheckoutState::Placing);

        let err = orchestrator.submit(request(full_selection())).err().unwrap();
        assert_eq!(err, SubmitRejected::Busy(CheckoutState::Placing));
        assert_eq!(orchestrator.status().attempt, 1);
    }

    #[test]
    fn test_amount_falls_back_to_subtotal_plus_shipping() {
        let mut req = request(full_selection());
        assert_eq!(req.amount(), Decimal::new(540, 0));

        req.summary_total = Some(Decimal::new(55_000, 2));
        assert_eq!(req.amount(), Decimal::new(550, 0));
    }

    #[test]
    fn test_acknowledge_without_outcome_is_noop() {
        let orchestrator = orchestrator();
        assert_eq!(orchestrator.acknowledge(), Acknowledgement::default());
    }

    #[test]
    fn test_state_guards() {
        assert!(CheckoutState::Idle.accepts_submit());
        assert!(CheckoutState::Failed.accepts_submit());
        assert!(CheckoutState::Cancelled.accepts_submit());
        assert!(!CheckoutState::AwaitingUserPayment.accepts_submit());
        assert!(!CheckoutState::Succeeded.accepts_submit());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&CheckoutState::AwaitingUserPayment).unwrap(),
            "\"awaiting_user_payment\""
        );
    }
}
