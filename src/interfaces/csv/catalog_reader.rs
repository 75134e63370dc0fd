use crate::domain::money::Money;
use crate::domain::product::{Product, ProductStatus};
use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    product_id: String,
    name: String,
    price: Decimal,
    status: ProductStatus,
}

/// Reads catalog entries with the header `product_id,name,price,status`.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn products(self) -> impl Iterator<Item = Result<Product>> {
        self.reader.into_deserialize().map(|result| {
            let record: CatalogRecord = result.map_err(OrderError::from)?;
            Ok(Product {
                id: record.product_id,
                name: record.name,
                price: Money::from_major(record.price)?,
                status: record.status,
            })
        })
    }

    pub fn read_all(self) -> Result<Vec<Product>> {
        self.products().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_rows() {
        let data = "product_id,name,price,status\nP1,Widget,1.00,valid\nP2,Gadget,3.10,out_of_stock";
        let products = CatalogReader::new(data.as_bytes()).read_all().unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, Money::from_minor(100));
        assert_eq!(products[1].status, ProductStatus::OutOfStock);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let data = "product_id,name,price,status\nP1,Widget,1.00,discontinued";
        assert!(CatalogReader::new(data.as_bytes()).read_all().is_err());
    }
}
