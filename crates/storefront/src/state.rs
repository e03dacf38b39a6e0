//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{ApiError, BackendClient};
use crate::checkout::{BrowserCheckout, CheckoutSessions, CheckoutSettings, SdkLoader};
use crate::config::StorefrontConfig;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// backend client, the checkout script and open checkout sessions.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: BackendClient,
    sdk: Arc<SdkLoader>,
    hosted: Arc<BrowserCheckout>,
    sessions: CheckoutSessions,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, ApiError> {
        let backend = BackendClient::new(&config.backend)?;
        let sdk = Arc::new(SdkLoader::new(config.gateway.script_url.clone()));
        let hosted = Arc::new(BrowserCheckout::new());
        let sessions = CheckoutSessions::new(
            backend.clone(),
            Arc::clone(&sdk),
            hosted.clone(),
            CheckoutSettings::from_config(&config),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                sdk,
                hosted,
                sessions,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Backend client authenticated with the service token, if any.
    #[must_use]
    pub fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    #[must_use]
    pub fn sdk(&self) -> &SdkLoader {
        &self.inner.sdk
    }

    /// Payment windows waiting for the browser.
    #[must_use]
    pub fn hosted(&self) -> &BrowserCheckout {
        &self.inner.hosted
    }

    #[must_use]
    pub fn sessions(&self) -> &CheckoutSessions {
        &self.inner.sessions
    }
}
