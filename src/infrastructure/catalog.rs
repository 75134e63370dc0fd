use crate::domain::ports::ProductValidator;
use crate::domain::product::{Product, ProductQuery, ProductStatus, ProductVerdict};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Product catalog held in memory.
///
/// In *open* mode a product the catalog has never heard of is accepted at the quoted
/// price, which keeps the CLI usable without a catalog file. A *closed* catalog
/// rejects unknown products.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<String, Product>>>,
    closed: bool,
}

impl InMemoryCatalog {
    /// An open catalog with no products.
    pub fn open() -> Self {
        Self::default()
    }

    /// A closed catalog containing exactly `products`.
    pub fn closed(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: Arc::new(RwLock::new(products)),
            closed: true,
        }
    }

    pub async fn insert(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }
}

#[async_trait]
impl ProductValidator for InMemoryCatalog {
    async fn validate_product(&self, query: &ProductQuery) -> Result<ProductVerdict> {
        if let Some(product) = self.products.read().await.get(&query.product_id) {
            let is_valid = product.status == ProductStatus::Valid;
            let message = if is_valid {
                "ok".to_string()
            } else {
                format!("product is {}", product.status)
            };
            return Ok(ProductVerdict {
                product: Some(product.clone()),
                is_valid,
                message,
            });
        }

        if self.closed {
            return Ok(ProductVerdict {
                product: None,
                is_valid: false,
                message: "product not found".to_string(),
            });
        }

        Ok(ProductVerdict {
            product: Some(Product {
                id: query.product_id.clone(),
                name: query.name.clone(),
                price: query.price,
                status: ProductStatus::Valid,
            }),
            is_valid: true,
            message: "ok".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;

    fn query(product_id: &str) -> ProductQuery {
        ProductQuery {
            product_id: product_id.to_string(),
            name: String::new(),
            price: Money::from_minor(100),
            quantity: 1,
        }
    }

    fn product(id: &str, status: ProductStatus) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            price: Money::from_minor(150),
            status,
        }
    }

    #[tokio::test]
    async fn test_open_catalog_accepts_quoted_price() {
        let catalog = InMemoryCatalog::open();
        let verdict = catalog.validate_product(&query("P1")).await.unwrap();
        assert!(verdict.is_valid);
        assert_eq!(verdict.product.unwrap().price, Money::from_minor(100));
    }

    #[tokio::test]
    async fn test_closed_catalog_rejects_unknown_products() {
        let catalog = InMemoryCatalog::closed([product("P1", ProductStatus::Valid)]);
        let verdict = catalog.validate_product(&query("P9")).await.unwrap();
        assert!(!verdict.is_valid);
        assert!(verdict.product.is_none());

        let known = catalog.validate_product(&query("P1")).await.unwrap();
        assert!(known.is_valid);
        assert_eq!(known.product.unwrap().price, Money::from_minor(150));
    }

    #[tokio::test]
    async fn test_catalog_reports_status() {
        let catalog = InMemoryCatalog::open();
        catalog.insert(product("P2", ProductStatus::OutOfStock)).await;
        let verdict = catalog.validate_product(&query("P2")).await.unwrap();
        assert!(!verdict.is_valid);
        assert_eq!(
            verdict.product.map(|p| p.status),
            Some(ProductStatus::OutOfStock)
        );
    }
}
