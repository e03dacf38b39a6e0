//! A hosted checkout that plays a scripted shopper.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kirana_storefront::checkout::{
    CheckoutOptions, GatewaySuccessResponse, HostedCheckout, HostedCheckoutError, WidgetOptions,
};

use crate::fake_backend::sign;

/// What the scripted shopper does when the payment window opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shopper {
    /// Pay, with a correct signature for the opened gateway order.
    Pays { payment_id: String },
    /// Pay, reporting the given gateway order id and signature.
    PaysWith {
        payment_id: String,
        gateway_order_id: String,
        signature: String,
    },
    /// Close the window without paying.
    Dismisses,
    /// Walk away; neither callback fires until the window is closed.
    WalksAway,
    /// The window fails to open.
    Unavailable,
}

impl Shopper {
    /// Shopper that pays as `pay_1`.
    #[must_use]
    pub fn paying() -> Self {
        Self::Pays {
            payment_id: "pay_1".to_string(),
        }
    }
}

/// [`HostedCheckout`] that acts out a [`Shopper`] script.
pub struct ScriptedCheckout {
    shopper: Mutex<Shopper>,
    opened: Mutex<Vec<WidgetOptions>>,
    closed: Mutex<Vec<String>>,
    abandoned: Mutex<Vec<CheckoutOptions>>,
}

impl ScriptedCheckout {
    #[must_use]
    pub fn new(shopper: Shopper) -> Arc<Self> {
        Arc::new(Self {
            shopper: Mutex::new(shopper),
            opened: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
            abandoned: Mutex::new(Vec::new()),
        })
    }

    /// Shopper that pays as `pay_1`.
    #[must_use]
    pub fn paying() -> Arc<Self> {
        Self::new(Shopper::Pays {
            payment_id: "pay_1".to_string(),
        })
    }

    /// Change what the shopper does on the next window.
    pub fn set(&self, shopper: Shopper) {
        *lock(&self.shopper) = shopper;
    }

    /// Widget options of every window opened.
    #[must_use]
    pub fn opened(&self) -> Vec<WidgetOptions> {
        lock(&self.opened).clone()
    }

    /// Gateway order ids of every window closed by the storefront.
    #[must_use]
    pub fn closed(&self) -> Vec<String> {
        lock(&self.closed).clone()
    }
}

impl HostedCheckout for ScriptedCheckout {
    fn open(&self, options: CheckoutOptions) -> Result<(), HostedCheckoutError> {
        let shopper = lock(&self.shopper).clone();
        let gateway_order_id = options.widget.order_id.clone();
        lock(&self.opened).push(options.widget.clone());

        match shopper {
            Shopper::Pays { payment_id } => {
                let signature = sign(&gateway_order_id, &payment_id);
                (options.handler)(GatewaySuccessResponse {
                    payment_id,
                    order_id: gateway_order_id,
                    signature,
                });
            }
            Shopper::PaysWith {
                payment_id,
                gateway_order_id,
                signature,
            } => (options.handler)(GatewaySuccessResponse {
                payment_id,
                order_id: gateway_order_id,
                signature,
            }),
            Shopper::Dismisses => (options.on_dismiss)(),
            Shopper::WalksAway => lock(&self.abandoned).push(options),
            Shopper::Unavailable => {
                return Err(HostedCheckoutError::Unavailable(
                    "widget failed to load".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn close(&self, gateway_order_id: &str) {
        lock(&self.closed).push(gateway_order_id.to_string());
        lock(&self.abandoned).retain(|options| options.widget.order_id != gateway_order_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
