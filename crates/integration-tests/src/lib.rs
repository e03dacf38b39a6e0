//! Integration tests for Kirana checkout.
//!
//! Every test runs against [`FakeBackend`], an in-process axum server that
//! stands in for the REST backend and the gateway's script host. No network
//! access or external services are needed:
//!
//! ```bash
//! cargo test -p kirana-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - the orchestrator from submit to a terminal state
//! - `order_placement` - placing orders and mapping backend errors
//! - `summary` - summary recomputation and fallback
//! - `gateway` - script loading and signature verification
//! - `storefront_routes` - the HTTP surface end to end

pub mod fake_backend;
pub mod fixtures;
pub mod scripted;

use std::sync::Arc;

use kirana_storefront::backend::BackendClient;
use kirana_storefront::checkout::{
    CheckoutOrchestrator, CheckoutSettings, GatewayClient, HostedCheckout, OrderPlacer,
    PaymentRecorder, SdkLoader,
};
use kirana_storefront::config::{BackendConfig, CheckoutConfig};

pub use fake_backend::{Behaviour, FakeBackend, OrderReply, VerifyReply, count, sign};
pub use scripted::{ScriptedCheckout, Shopper};

/// A fake backend plus the clients and hosted UI wired to it.
pub struct Harness {
    pub backend: FakeBackend,
    pub client: BackendClient,
    pub sdk: Arc<SdkLoader>,
    pub hosted: Arc<ScriptedCheckout>,
}

impl Harness {
    /// Start a fake backend and a hosted UI acting out `shopper`.
    ///
    /// # Panics
    ///
    /// Panics if the fake backend cannot start.
    #[allow(clippy::unwrap_used)]
    pub async fn start(shopper: Shopper) -> Self {
        let backend = FakeBackend::start().await;
        let client = BackendClient::new(&BackendConfig::new(&backend.base_url()).unwrap()).unwrap();
        let sdk = Arc::new(SdkLoader::new(backend.script_url()));
        Self {
            backend,
            client,
            sdk,
            hosted: ScriptedCheckout::new(shopper),
        }
    }

    /// Gateway client with the script loader and scripted UI attached.
    #[must_use]
    pub fn gateway(&self) -> GatewayClient {
        let hosted: Arc<dyn HostedCheckout> = self.hosted.clone();
        GatewayClient::new(self.client.clone())
            .with_sdk(Arc::clone(&self.sdk))
            .with_hosted(hosted)
    }

    /// Orchestrator with default checkout settings.
    #[must_use]
    pub fn orchestrator(&self) -> CheckoutOrchestrator {
        self.orchestrator_with(CheckoutConfig::default())
    }

    #[must_use]
    pub fn orchestrator_with(&self, checkout: CheckoutConfig) -> CheckoutOrchestrator {
        CheckoutOrchestrator::new(
            OrderPlacer::new(self.client.clone(), checkout.payment_page.clone()),
            self.gateway(),
            PaymentRecorder::new(self.client.clone()),
            CheckoutSettings {
                key_id: fixtures::KEY_ID.to_string(),
                checkout,
            },
        )
    }
}
