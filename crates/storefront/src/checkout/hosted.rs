//! Hosted payment UI served to the browser.
//!
//! The widget itself runs in the shopper's browser. Opening a checkout parks
//! its options here under the gateway order id; the page fetches them, renders
//! the widget, and posts the widget's callbacks back, which land in
//! [`BrowserCheckout::complete`] or [`BrowserCheckout::dismiss`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::gateway::{
    CheckoutOptions, DismissHandler, GatewaySuccessResponse, HostedCheckout, HostedCheckoutError,
    SuccessHandler, WidgetOptions,
};

struct PendingCheckout {
    widget: WidgetOptions,
    handler: SuccessHandler,
    on_dismiss: DismissHandler,
}

/// Payment windows waiting for the browser, keyed by gateway order id.
#[derive(Default)]
pub struct BrowserCheckout {
    pending: Mutex<HashMap<String, PendingCheckout>>,
}

impl BrowserCheckout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Widget options for an open payment window.
    #[must_use]
    pub fn widget(&self, gateway_order_id: &str) -> Option<WidgetOptions> {
        self.lock()
            .get(gateway_order_id)
            .map(|pending| pending.widget.clone())
    }

    /// Number of open payment windows.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver a success callback. Returns `false` if no window is open for
    /// the gateway order, e.g. a repeated callback.
    pub fn complete(&self, gateway_order_id: &str, response: GatewaySuccessResponse) -> bool {
        let Some(pending) = self.lock().remove(gateway_order_id) else {
            debug!(gateway_order_id, "Success callback for unknown payment window");
            return false;
        };
        info!(gateway_order_id, "Payment window reported success");
        (pending.handler)(response);
        true
    }

    /// Deliver a dismissal callback. Returns `false` if no window is open.
    pub fn dismiss(&self, gateway_order_id: &str) -> bool {
        let Some(pending) = self.lock().remove(gateway_order_id) else {
            debug!(gateway_order_id, "Dismiss callback for unknown payment window");
            return false;
        };
        info!(gateway_order_id, "Payment window dismissed");
        (pending.on_dismiss)();
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingCheckout>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for BrowserCheckout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserCheckout")
            .field("open", &self.open_count())
            .finish()
    }
}

impl HostedCheckout for BrowserCheckout {
    fn open(&self, options: CheckoutOptions) -> Result<(), HostedCheckoutError> {
        let CheckoutOptions {
            widget,
            handler,
            on_dismiss,
        } = options;
        let gateway_order_id = widget.order_id.clone();

        let mut pending = self.lock();
        if pending.contains_key(&gateway_order_id) {
            return Err(HostedCheckoutError::AlreadyOpen(gateway_order_id));
        }
        pending.insert(
            gateway_order_id,
            PendingCheckout {
                widget,
                handler,
                on_dismiss,
            },
        );
        Ok(())
    }

    fn close(&self, gateway_order_id: &str) {
        if self.lock().remove(gateway_order_id).is_some() {
            debug!(gateway_order_id, "Payment window closed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kirana_core::CurrencyCode;

    use super::*;
    use crate::checkout::gateway::{Prefill, Theme};

    fn options(order_id: &str, successes: Arc<AtomicUsize>, dismissals: Arc<AtomicUsize>) -> CheckoutOptions {
        CheckoutOptions {
            widget: WidgetOptions {
                key: "rzp_test".to_string(),
                amount: 54_000,
                currency: CurrencyCode::INR,
                name: "Kirana".to_string(),
                description: "Order 77".to_string(),
                image: None,
                order_id: order_id.to_string(),
                prefill: Prefill::default(),
                theme: Theme {
                    color: "#3399cc".to_string(),
                },
            },
            handler: Box::new(move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            }),
            on_dismiss: Box::new(move || {
                dismissals.fetch_add(1, Ordering::SeqCst);
            }),
        }
    }

    fn response() -> GatewaySuccessResponse {
        GatewaySuccessResponse {
            payment_id: "pay_1".to_string(),
            order_id: "g1".to_string(),
            signature: "sig1".to_string(),
        }
    }

    #[test]
    fn test_widget_available_until_callback() {
        let hosted = BrowserCheckout::new();
        let successes = Arc::new(AtomicUsize::new(0));
        let dismissals = Arc::new(AtomicUsize::new(0));
        hosted
            .open(options("g1", successes.clone(), dismissals.clone()))
            .unwrap();

        assert_eq!(hosted.widget("g1").unwrap().amount, 54_000);
        assert!(hosted.complete("g1", response()));
        assert!(hosted.widget("g1").is_none());
        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_only_first_callback_counts() {
        let hosted = BrowserCheckout::new();
        let successes = Arc::new(AtomicUsize::new(0));
        let dismissals = Arc::new(AtomicUsize::new(0));
        hosted
            .open(options("g1", successes.clone(), dismissals.clone()))
            .unwrap();

        assert!(hosted.complete("g1", response()));
        assert!(!hosted.complete("g1", response()));
        assert!(!hosted.dismiss("g1"));
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(dismissals.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_open_twice_rejected() {
        let hosted = BrowserCheckout::new();
        let counter = Arc::new(AtomicUsize::new(0));
        hosted
            .open(options("g1", counter.clone(), counter.clone()))
            .unwrap();
        let err = hosted
            .open(options("g1", counter.clone(), counter.clone()))
            .unwrap_err();
        assert!(matches!(err, HostedCheckoutError::AlreadyOpen(id) if id == "g1"));
    }

    #[test]
    fn test_close_drops_handlers() {
        let hosted = BrowserCheckout::new();
        let counter = Arc::new(AtomicUsize::new(0));
        hosted
            .open(options("g1", counter.clone(), counter.clone()))
            .unwrap();
        hosted.close("g1");
        assert_eq!(hosted.open_count(), 0);
        assert!(!hosted.dismiss("g1"));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
