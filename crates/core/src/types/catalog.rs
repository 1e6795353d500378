//! Catalog records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product row from the `products` table.
///
/// Owned and created by the hosted backend; the storefront never writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Unit price in the store currency (non-negative).
    pub price: Decimal,
    #[serde(default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Unit price in the store currency.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::store(self.price)
    }

    /// Case-insensitive substring match against name or description.
    ///
    /// `needle` must already be lowercased.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_row() {
        let json = r#"{
            "id": "9f1c1d4e-6a3b-4d1e-8f0a-1b2c3d4e5f60",
            "name": "Bougie parfumée",
            "description": "Cire de soja",
            "price": 15.5,
            "image_url": "https://cdn.example/bougie.jpg",
            "created_at": "2024-03-01T10:00:00Z"
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.price, Decimal::new(155, 1));
        assert_eq!(product.unit_price().display(), "15.50 €");
        assert!(product.created_at.is_some());
    }

    #[test]
    fn test_matches_name_or_description() {
        let product = Product {
            id: ProductId::generate(),
            name: "Carnet Lin".to_string(),
            description: "Papier recyclé".to_string(),
            price: Decimal::ONE,
            image_url: String::new(),
            created_at: None,
        };
        assert!(product.matches("lin"));
        assert!(product.matches("recyclé"));
        assert!(!product.matches("bougie"));
    }
}
