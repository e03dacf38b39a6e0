//! Kirana Storefront library.
//!
//! Checkout for the Kirana storefront: the REST backend client, the checkout
//! components (order placement, gateway payment, payment recording, summary)
//! and the JSON routes the checkout page talks to. Exposed as a library so the
//! integration tests can drive it in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod checkout;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
