//! One-time loading of the gateway's checkout script.
//!
//! The script is fetched once per process and served to browsers from the
//! storefront's own origin. Concurrent callers during the first load wait on
//! the same fetch. A failed fetch is not remembered, so the next caller tries
//! again.

use axum::body::Bytes;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use url::Url;

/// Errors from fetching the checkout script.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("script host returned {0}")]
    Status(u16),

    #[error("script body was empty")]
    Empty,
}

/// Single-initialization guard around the checkout script.
#[derive(Debug)]
pub struct SdkLoader {
    client: reqwest::Client,
    url: Url,
    script: OnceCell<Bytes>,
}

impl SdkLoader {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            script: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the script has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.script.initialized()
    }

    /// The loaded script, if any.
    #[must_use]
    pub fn script(&self) -> Option<Bytes> {
        self.script.get().cloned()
    }

    /// Load the script if it is not loaded yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails; the failure is not cached.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn load(&self) -> Result<&Bytes, SdkError> {
        self.script
            .get_or_try_init(|| async {
                let response = self.client.get(self.url.clone()).send().await?;
                let status = response.status();
                if !status.is_success() {
                    warn!(status = %status, "Checkout script fetch failed");
                    return Err(SdkError::Status(status.as_u16()));
                }

                let body = response.bytes().await?;
                if body.is_empty() {
                    return Err(SdkError::Empty);
                }

                info!(bytes = body.len(), "Checkout script loaded");
                Ok(body)
            })
            .await
    }
}
