//! Guest cart storage.
//!
//! A guest cart lives in one named string slot holding the JSON-serialized
//! list of [`CartItem`]s. In the running server the slot is a key in the
//! visitor's session; tests use [`MemoryGuestStore`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_sessions::Session;
use tracing::warn;

use atelier_core::CartItem;

use crate::models::session_keys;

/// Errors that can occur when writing the guest slot.
#[derive(Debug, Error)]
pub enum GuestStoreError {
    /// Session store failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Cart could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single named string slot for the guest cart.
#[async_trait]
pub trait GuestStore: Send + Sync {
    /// Raw slot contents, `None` when the slot was never written.
    async fn read_slot(&self) -> Result<Option<String>, GuestStoreError>;

    /// Replace the whole slot.
    async fn write_slot(&self, raw: String) -> Result<(), GuestStoreError>;

    /// Remove the slot. Clearing an absent slot succeeds.
    async fn clear_slot(&self) -> Result<(), GuestStoreError>;
}

/// Guest slot kept in the visitor's session.
#[derive(Clone)]
pub struct SessionGuestStore {
    session: Session,
}

impl SessionGuestStore {
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl GuestStore for SessionGuestStore {
    async fn read_slot(&self) -> Result<Option<String>, GuestStoreError> {
        Ok(self.session.get::<String>(session_keys::GUEST_CART).await?)
    }

    async fn write_slot(&self, raw: String) -> Result<(), GuestStoreError> {
        self.session.insert(session_keys::GUEST_CART, raw).await?;
        Ok(())
    }

    async fn clear_slot(&self) -> Result<(), GuestStoreError> {
        self.session
            .remove::<String>(session_keys::GUEST_CART)
            .await?;
        Ok(())
    }
}

/// Guest slot held in memory.
#[derive(Default)]
pub struct MemoryGuestStore {
    slot: Mutex<Option<String>>,
}

impl MemoryGuestStore {
    /// Create a store whose slot already holds `raw`.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// Current raw slot contents.
    pub async fn raw(&self) -> Option<String> {
        self.slot.lock().await.clone()
    }
}

#[async_trait]
impl GuestStore for MemoryGuestStore {
    async fn read_slot(&self) -> Result<Option<String>, GuestStoreError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn write_slot(&self, raw: String) -> Result<(), GuestStoreError> {
        *self.slot.lock().await = Some(raw);
        Ok(())
    }

    async fn clear_slot(&self) -> Result<(), GuestStoreError> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

/// Read the guest cart.
///
/// An absent, unreadable, or malformed slot is an empty cart.
pub async fn read_items(store: &dyn GuestStore) -> Vec<CartItem> {
    let raw = match store.read_slot().await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read guest cart slot");
            return Vec::new();
        }
    };

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Discarding malformed guest cart");
        Vec::new()
    })
}

/// Replace the guest cart with `items`.
///
/// # Errors
///
/// Returns an error if the items cannot be serialized or the slot cannot be
/// written.
pub async fn write_items(
    store: &dyn GuestStore,
    items: &[CartItem],
) -> Result<(), GuestStoreError> {
    let raw = serde_json::to_string(items)?;
    store.write_slot(raw).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use atelier_core::{Product, ProductId};

    fn item(name: &str) -> CartItem {
        let product = Product {
            id: ProductId::generate(),
            name: name.to_string(),
            description: String::new(),
            price: Decimal::new(1000, 2),
            image_url: String::new(),
            created_at: None,
        };
        CartItem::guest(&product, "")
    }

    #[tokio::test]
    async fn test_absent_slot_reads_empty() {
        let store = MemoryGuestStore::default();
        assert!(read_items(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_slot_reads_empty() {
        let store = MemoryGuestStore::with_raw("{not json");
        assert!(read_items(&store).await.is_empty());

        let store = MemoryGuestStore::with_raw(r#"{"id":"not-a-list"}"#);
        assert!(read_items(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_write_replaces_whole_slot() {
        let store = MemoryGuestStore::default();
        write_items(&store, &[item("Mug"), item("Bol")]).await.unwrap();
        write_items(&store, &[item("Vase")]).await.unwrap();

        let items = read_items(&store).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product.name, "Vase");
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = MemoryGuestStore::default();
        store.clear_slot().await.unwrap();
        write_items(&store, &[item("Mug")]).await.unwrap();
        store.clear_slot().await.unwrap();
        store.clear_slot().await.unwrap();
        assert!(store.raw().await.is_none());
    }
}
