use crate::application::orchestrator::OrderLine;
use crate::domain::money::Money;
use crate::error::{OrderError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct LineRecord {
    product_id: String,
    quantity: i64,
    unit_price: Decimal,
}

/// Reads order lines from a CSV source with the header `product_id,quantity,unit_price`.
///
/// Prices are in major units (`1.50`) and converted to minor units on the way in; a
/// price with more than two decimal places is rejected rather than rounded.
pub struct LineItemReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> LineItemReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and converts order lines.
    pub fn lines(self) -> impl Iterator<Item = Result<OrderLine>> {
        self.reader.into_deserialize().map(|result| {
            let record: LineRecord = result.map_err(OrderError::from)?;
            Ok(OrderLine {
                product_id: record.product_id,
                quantity: record.quantity,
                unit_price: Money::from_major(record.unit_price)?,
            })
        })
    }

    /// Reads every line, stopping at the first malformed record.
    pub fn read_all(self) -> Result<Vec<OrderLine>> {
        self.lines().collect()
    }
}
