//! Newtype IDs for type-safe entity references.
//!
//! The hosted backend keys every table by UUID, so each ID wraps a
//! [`Uuid`]. Use the `define_id!` macro to create wrappers that prevent
//! accidentally mixing IDs from different entity types.

use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`uuid::Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `generate()`, `as_uuid()`
/// - `Display`, `FromStr`, `From<Uuid>` and `Into<Uuid>` implementations
///
/// # Example
///
/// ```rust
/// # use atelier_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::generate();
/// let order_id = OrderId::generate();
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
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
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Wrap an existing UUID.
            #[must_use]
            pub const fn new(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random (v4) ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::uuid::Error;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                ::uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(CartItemId);
define_id!(OrderId);
define_id!(OrderItemId);

impl OrderId {
    /// Short customer-facing reference (first 8 hex characters).
    #[must_use]
    pub fn short_reference(&self) -> String {
        self.0.simple().to_string().chars().take(8).collect()
    }
}

/// Parse a UUID-backed ID, mapping failure to `None`.
///
/// Convenience for route parameters where a malformed ID simply means
/// "not found".
#[must_use]
pub fn parse_id<T: From<Uuid>>(s: &str) -> Option<T> {
    Uuid::parse_str(s).ok().map(T::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(CartItemId::generate(), CartItemId::generate());
    }

    #[test]
    fn test_display_and_from_str() {
        let id = ProductId::generate();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_serde_is_transparent() {
        let uuid = Uuid::parse_str("0b5b6c1e-3f2a-4c4e-9a51-2d7f1b0c9e11").unwrap();
        let json = serde_json::to_string(&UserId::new(uuid)).unwrap();
        assert_eq!(json, "\"0b5b6c1e-3f2a-4c4e-9a51-2d7f1b0c9e11\"");
    }

    #[test]
    fn test_short_reference() {
        let uuid = Uuid::parse_str("0b5b6c1e-3f2a-4c4e-9a51-2d7f1b0c9e11").unwrap();
        assert_eq!(OrderId::new(uuid).short_reference(), "0b5b6c1e");
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(parse_id::<CartItemId>("1718900000000").is_none());
        assert!(parse_id::<CartItemId>(&Uuid::new_v4().to_string()).is_some());
    }
}
