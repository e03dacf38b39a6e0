//! Newtype IDs for backend entity references.
//!
//! Every record the checkout flow points at (addresses, shipping methods,
//! payment methods, orders, payments) is owned by the backend and identified
//! by an integer. The `define_id!` macro keeps those integers from being mixed
//! up: a `ShippingMethodId` cannot be passed where a `PaymentMethodId` is
//! expected.

/// Error returned when an ID cannot be parsed from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {value:?}")]
pub struct ParseIdError {
    /// Name of the ID type being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `Display`
/// - `FromStr` (for CLI arguments and query strings)
/// - `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use kirana_core::define_id;
/// define_id!(AddressId);
/// define_id!(OrderId);
///
/// let address = AddressId::new(1);
/// let order: OrderId = "77".parse().unwrap();
/// assert_eq!(order.as_i32(), 77);
///
/// // These are different types, so this won't compile:
/// // let _: AddressId = order;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::ParseIdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim()
                    .parse::<i32>()
                    .map(Self)
                    .map_err(|_| $crate::types::id::ParseIdError {
                        kind: stringify!($name),
                        value: s.to_owned(),
                    })
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(AddressId);
define_id!(ShippingMethodId);
define_id!(PaymentMethodId);
define_id!(OrderId);
define_id!(PaymentId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_str() {
        let id: OrderId = "77".parse().unwrap();
        assert_eq!(id, OrderId::new(77));

        let id: OrderId = " 12 ".parse().unwrap();
        assert_eq!(id.as_i32(), 12);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "abc".parse::<ShippingMethodId>().unwrap_err();
        assert_eq!(err.kind, "ShippingMethodId");
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&AddressId::new(5)).unwrap();
        assert_eq!(json, "5");

        let parsed: PaymentMethodId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, PaymentMethodId::new(9));
    }
}
