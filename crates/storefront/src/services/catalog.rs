//! Product catalog: gallery, detail lookup, and search.

use tracing::{instrument, warn};

use atelier_core::{Product, ProductId};

use crate::backend::{Backend, BackendError};

/// Read-only view over the product collection.
pub struct Catalog<'a> {
    backend: &'a dyn Backend,
}

impl<'a> Catalog<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// All products, oldest first.
    ///
    /// A failed read is logged and yields an empty gallery.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Vec<Product> {
        match self.backend.list_products().await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "Failed to load products");
                Vec::new()
            }
        }
    }

    /// Product with `id`, if it is in the catalog. A failed read is
    /// logged and yields `None`.
    #[instrument(skip(self))]
    pub async fn find(&self, id: ProductId) -> Option<Product> {
        self.list().await.into_iter().find(|p| p.id == id)
    }

    /// Product with `id`, distinguishing "not in the catalog" from a
    /// failed read.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the products cannot be read.
    pub async fn lookup(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        let products = self.backend.list_products().await?;
        Ok(products.into_iter().find(|p| p.id == id))
    }

    /// Products whose name or description contains `query`, ignoring case.
    ///
    /// A blank query matches nothing.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Vec<Product> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.list()
            .await
            .into_iter()
            .filter(|p| p.matches(&needle))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::backend::{FailPoint, MemoryBackend};

    fn product(name: &str, description: &str) -> Product {
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            description: description.to_string(),
            price: Decimal::new(2000, 2),
            image_url: String::new(),
            created_at: None,
        }
    }

    fn backend() -> MemoryBackend {
        MemoryBackend::with_products(vec![
            product("Bol en grès", "Émaillé à la main"),
            product("Mug", "Tasse en grès bleu"),
            product("Vase", "Porcelaine"),
        ])
    }

    #[tokio::test]
    async fn test_search_matches_name_or_description_ignoring_case() {
        let backend = backend();
        let catalog = Catalog::new(&backend);

        let names: Vec<String> = catalog
            .search("GRÈS")
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Bol en grès", "Mug"]);
    }

    #[tokio::test]
    async fn test_blank_search_matches_nothing() {
        let backend = backend();
        let catalog = Catalog::new(&backend);
        assert!(catalog.search("   ").await.is_empty());
    }

    #[tokio::test]
    async fn test_list_fails_soft() {
        let backend = backend();
        backend.fail(FailPoint::ListProducts).await;
        let catalog = Catalog::new(&backend);

        assert!(catalog.list().await.is_empty());
        assert!(catalog.find(ProductId::generate()).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_reports_failed_read() {
        let backend = backend();
        let catalog = Catalog::new(&backend);
        let vase = catalog.list().await.pop().unwrap();
        assert!(catalog.lookup(vase.id).await.unwrap().is_some());
        assert!(catalog.lookup(ProductId::generate()).await.unwrap().is_none());

        backend.fail(FailPoint::ListProducts).await;
        assert!(catalog.lookup(vase.id).await.is_err());
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let backend = backend();
        let catalog = Catalog::new(&backend);
        let vase = catalog.list().await.pop().unwrap();

        assert_eq!(catalog.find(vase.id).await.unwrap().name, "Vase");
    }
}
