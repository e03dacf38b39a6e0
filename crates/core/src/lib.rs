//! Kirana Core - Shared types library.
//!
//! This crate provides common types used across all Kirana components:
//! - `storefront` - Checkout sessions, backend client and payment orchestration
//! - `cli` - Operator tools for checkout options and payment reconciliation
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Anything that
//! talks to the backend or the payment gateway lives in `kirana-storefront`.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, currencies, contact details and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
