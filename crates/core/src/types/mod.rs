//! Core types for Kirana.

pub mod contact;
pub mod id;
pub mod price;
pub mod status;

pub use contact::{Contact, ContactError, Email, Phone};
pub use id::*;
pub use price::CurrencyCode;
pub use status::*;
