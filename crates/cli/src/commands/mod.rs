//! Command implementations.
//!
//! # Environment Variables
//!
//! - `KIRANA_BACKEND_URL` - REST backend base URL
//! - `KIRANA_API_TOKEN` - Service token used when no shopper token is given
//! - `BACKEND_TIMEOUT_MS` - Request timeout

pub mod addresses;
pub mod options;
pub mod reconcile;
pub mod summary;

use kirana_storefront::backend::{ApiError, BackendClient};
use kirana_storefront::config::{BackendConfig, ConfigError};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Output could not be rendered.
    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend did not confirm the gateway signature.
    #[error("Payment {0} could not be verified; nothing was recorded")]
    NotVerified(String),

    /// The backend refused the payment record.
    #[error("Payment {0} was verified but could not be recorded")]
    RecordFailed(String),
}

/// Backend access shared by every command.
pub struct Context {
    pub backend: BackendClient,
}

impl Context {
    /// Build the backend client from the environment, acting as the shopper
    /// whose `token` is given.
    pub fn from_env(token: Option<String>) -> Result<Self, CliError> {
        let config = BackendConfig::from_env()?;
        if token.is_none() && !config.has_token() {
            tracing::warn!("No shopper or service token; backend calls are anonymous");
        }
        let backend = BackendClient::new(&config)?;
        let backend = match token {
            Some(token) => backend.authenticated(SecretString::from(token)),
            None => backend,
        };
        tracing::debug!(base_url = %backend.base_url(), "Backend configured");
        Ok(Self { backend })
    }
}

/// Print `value` as pretty JSON.
#[allow(clippy::print_stdout)]
pub fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
