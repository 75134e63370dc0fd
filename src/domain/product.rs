use super::money::Money;
use crate::error::{OrderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Valid,
    Invalid,
    Deleted,
    OutOfStock,
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProductStatus::Valid => "valid",
            ProductStatus::Invalid => "invalid",
            ProductStatus::Deleted => "deleted",
            ProductStatus::OutOfStock => "out_of_stock",
        };
        f.write_str(label)
    }
}

impl FromStr for ProductStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "valid" => Ok(ProductStatus::Valid),
            "invalid" => Ok(ProductStatus::Invalid),
            "deleted" => Ok(ProductStatus::Deleted),
            "out_of_stock" => Ok(ProductStatus::OutOfStock),
            other => Err(OrderError::ValidationError(format!(
                "Unknown product status '{}'",
                other
            ))),
        }
    }
}

/// Product state as reported by the catalog.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Money,
    pub status: ProductStatus,
}

/// What the caller quoted for one line of a new order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub product_id: String,
    pub name: String,
    pub price: Money,
    pub quantity: i64,
}

/// Catalog answer to a [`ProductQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProductVerdict {
    pub product: Option<Product>,
    pub is_valid: bool,
    pub message: String,
}
