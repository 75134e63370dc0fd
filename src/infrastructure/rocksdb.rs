use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{OrderRepository, PaymentRepository};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for order headers (the order without its items).
pub const CF_ORDERS: &str = "orders";
/// Column Family for line items, keyed `{order_id}\0{index:04}`.
pub const CF_ORDER_ITEMS: &str = "order_items";
/// Column Family for payments, keyed by payment ID.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent store implementation using RocksDB.
///
/// Handles storage for both `Order` and `Payment` aggregates using separate Column
/// Families. An order write (header, removal of the old items, new items) is one
/// `WriteBatch`, so readers never observe a partially replaced item set.
///
/// Version checks are read-then-write, so writers are serialized by an async mutex;
/// readers go straight to the database. `Clone` shares both.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_guard: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "orders", "order_items" and "payments" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_ORDERS, CF_ORDER_ITEMS, CF_PAYMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self {
            db: Arc::new(db),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| OrderError::StorageError {
            step: "open column family",
            message: format!("column family '{}' not found", name),
        })
    }

    fn read_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let Some(bytes) = self.db.get_cf(self.cf(CF_ORDERS)?, id.as_str())? else {
            return Ok(None);
        };
        let mut order: Order = serde_json::from_slice(&bytes)?;

        let prefix = item_prefix(id);
        let iter = self.db.iterator_cf(
            self.cf(CF_ORDER_ITEMS)?,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );
        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            order.items.push(serde_json::from_slice(&value)?);
        }
        Ok(Some(order))
    }

    fn read_payment(&self, id: &PaymentId) -> Result<Option<Payment>> {
        match self.db.get_cf(self.cf(CF_PAYMENTS)?, id.as_str())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every payment of the order in key order, which is attempt order.
    fn read_payments(&self, order_id: &OrderId) -> Result<Vec<Payment>> {
        let prefix = PaymentId::order_prefix(order_id);
        let iter = self.db.iterator_cf(
            self.cf(CF_PAYMENTS)?,
            IteratorMode::From(prefix.as_bytes(), Direction::Forward),
        );

        let mut payments = Vec::new();
        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let payment: Payment = serde_json::from_slice(&value)?;
            // "pay-o-1-" is also a prefix of "pay-o-1-x-0001".
            if &payment.order_id == order_id {
                payments.push(payment);
            }
        }
        Ok(payments)
    }
}

fn item_prefix(id: &OrderId) -> String {
    format!("{}\0", id)
}

fn item_prefix_end(id: &OrderId) -> String {
    format!("{}\u{1}", id)
}

#[async_trait]
impl OrderRepository for RocksDBStore {
    async fn save(&self, order: &Order) -> Result<u64> {
        if order.status == OrderStatus::Unknown {
            return Err(OrderError::ValidationError(format!(
                "Refusing to persist order {} with unknown status",
                order.id
            )));
        }

        let _guard = self.write_guard.lock().await;
        let orders = self.cf(CF_ORDERS)?;
        let items_cf = self.cf(CF_ORDER_ITEMS)?;

        let stored_version = match self.db.get_cf(orders, order.id.as_str())? {
            Some(bytes) => serde_json::from_slice::<Order>(&bytes)?.version,
            None => 0,
        };
        if stored_version != order.version {
            return Err(OrderError::OptimisticLockConflict {
                id: order.id.to_string(),
                expected: order.version,
                actual: stored_version,
            });
        }

        let mut header = order.clone();
        let items = std::mem::take(&mut header.items);
        header.version = stored_version + 1;

        let prefix = item_prefix(&order.id);
        let mut batch = WriteBatch::default();
        batch.put_cf(orders, order.id.as_str(), serde_json::to_vec(&header)?);
        batch.delete_range_cf(items_cf, prefix.as_bytes(), item_prefix_end(&order.id).as_bytes());
        for (index, item) in items.iter().enumerate() {
            batch.put_cf(
                items_cf,
                format!("{}{:04}", prefix, index),
                serde_json::to_vec(item)?,
            );
        }
        self.db.write(batch)?;

        Ok(header.version)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Order> {
        self.read_order(id)?
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))
    }
}

#[async_trait]
impl PaymentRepository for RocksDBStore {
    async fn save(&self, payment: &Payment) -> Result<u64> {
        let _guard = self.write_guard.lock().await;

        let stored_version = self
            .read_payment(&payment.id)?
            .map(|p| p.version)
            .unwrap_or(0);
        if stored_version != payment.version {
            return Err(OrderError::OptimisticLockConflict {
                id: payment.id.to_string(),
                expected: payment.version,
                actual: stored_version,
            });
        }

        if payment.version == 0
            && payment.status.is_active()
            && let Some(active) = self
                .read_payments(&payment.order_id)?
                .into_iter()
                .find(|p| p.status.is_active())
        {
            return Err(OrderError::DuplicateActivePayment {
                order_id: payment.order_id.to_string(),
                payment_id: active.id.to_string(),
            });
        }

        let mut record = payment.clone();
        record.version = stored_version + 1;
        self.db.put_cf(
            self.cf(CF_PAYMENTS)?,
            record.id.as_str(),
            serde_json::to_vec(&record)?,
        )?;

        Ok(record.version)
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Payment> {
        self.read_payment(id)?
            .ok_or_else(|| OrderError::PaymentNotFound(format!("payment {}", id)))
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Payment> {
        self.read_payments(order_id)?
            .into_iter()
            .rev()
            .find(|p| p.status != PaymentStatus::Failed)
            .ok_or_else(|| OrderError::PaymentNotFound(format!("order {}", order_id)))
    }

    async fn list_by_order_id(&self, order_id: &OrderId) -> Result<Vec<Payment>> {
        self.read_payments(order_id)
    }
}
