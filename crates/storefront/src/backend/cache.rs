//! Cache types for backend option lists.

use super::types::ShippingMethod;

/// Cache key for option lists shared by every shopper.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    ShippingMethods,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    ShippingMethods(Vec<ShippingMethod>),
}
