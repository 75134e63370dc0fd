use crate::domain::order::{Order, OrderId, OrderStatus};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{OrderRepository, PaymentRepository};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory order repository.
///
/// Uses `Arc<RwLock<HashMap<OrderId, Order>>>` so clones share one table. The version
/// check and the replacement of the order (items included) happen under a single
/// write guard with no await point in between, so a write is all-or-nothing even if
/// the calling future is dropped.
#[derive(Default, Clone)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    /// Creates a new, empty in-memory order repository.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<u64> {
        if order.status == OrderStatus::Unknown {
            return Err(OrderError::ValidationError(format!(
                "Refusing to persist order {} with unknown status",
                order.id
            )));
        }

        let mut orders = self.orders.write().await;
        let stored_version = orders.get(&order.id).map(|o| o.version).unwrap_or(0);
        if stored_version != order.version {
            return Err(OrderError::OptimisticLockConflict {
                id: order.id.to_string(),
                expected: order.version,
                actual: stored_version,
            });
        }

        let mut record = order.clone();
        record.version = stored_version + 1;
        let version = record.version;
        orders.insert(record.id.clone(), record);
        Ok(version)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Order> {
        let orders = self.orders.read().await;
        orders
            .get(id)
            .cloned()
            .ok_or_else(|| OrderError::OrderNotFound(id.to_string()))
    }
}

/// A thread-safe in-memory payment repository.
///
/// Besides the version check it enforces "at most one active payment per order",
/// the in-memory equivalent of a unique index on `(order_id, active status)`.
#[derive(Default, Clone)]
pub struct InMemoryPaymentRepository {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentRepository {
    /// Creates a new, empty in-memory payment repository.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<u64> {
        let mut payments = self.payments.write().await;
        let stored_version = payments.get(&payment.id).map(|p| p.version).unwrap_or(0);
        if stored_version != payment.version {
            return Err(OrderError::OptimisticLockConflict {
                id: payment.id.to_string(),
                expected: payment.version,
                actual: stored_version,
            });
        }

        if payment.version == 0
            && payment.status.is_active()
            && let Some(active) = payments
                .values()
                .find(|p| p.order_id == payment.order_id && p.status.is_active())
        {
            return Err(OrderError::DuplicateActivePayment {
                order_id: payment.order_id.to_string(),
                payment_id: active.id.to_string(),
            });
        }

        let mut record = payment.clone();
        record.version = stored_version + 1;
        let version = record.version;
        payments.insert(record.id.clone(), record);
        Ok(version)
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Payment> {
        let payments = self.payments.read().await;
        payments
            .get(id)
            .cloned()
            .ok_or_else(|| OrderError::PaymentNotFound(format!("payment {}", id)))
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Payment> {
        let payments = self.payments.read().await;
        payments
            .values()
            .filter(|p| &p.order_id == order_id && p.status != PaymentStatus::Failed)
            .max_by(|a, b| a.id.cmp(&b.id))
            .cloned()
            .ok_or_else(|| OrderError::PaymentNotFound(format!("order {}", order_id)))
    }

    async fn list_by_order_id(&self, order_id: &OrderId) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut history: Vec<Payment> = payments
            .values()
            .filter(|p| &p.order_id == order_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::order::LineItem;
    use crate::domain::payment::PaymentChannel;

    fn order(id: &str) -> Order {
        let item = LineItem::new("P1", 2, Money::from_minor(100)).unwrap();
        Order::new(OrderId::new(id), "c-1", vec![item]).unwrap()
    }

    fn payment(order_id: &OrderId, attempt: usize) -> Payment {
        Payment::new(
            PaymentId::for_attempt(order_id, attempt),
            order_id.clone(),
            Money::from_minor(200),
            "CNY",
            PaymentChannel::Alipay,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_order_repository() {
        let repo = InMemoryOrderRepository::new();
        let mut order = order("o-1");

        order.version = repo.save(&order).await.unwrap();
        assert_eq!(order.version, 1);

        let retrieved = repo.find_by_id(&order.id).await.unwrap();
        assert_eq!(retrieved, order);

        assert!(matches!(
            repo.find_by_id(&OrderId::new("o-2")).await,
            Err(OrderError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stale_order_write_is_rejected_and_leaves_row_unchanged() {
        let repo = InMemoryOrderRepository::new();
        let mut order = order("o-1");
        order.version = repo.save(&order).await.unwrap();

        let mut first = repo.find_by_id(&order.id).await.unwrap();
        let mut second = first.clone();

        first.mark_as_pending_payment().unwrap();
        first.version = repo.save(&first).await.unwrap();
        assert_eq!(first.version, 2);

        second.cancel().unwrap();
        let err = repo.save(&second).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::OptimisticLockConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let stored = repo.find_by_id(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let repo = InMemoryOrderRepository::new();
        let order = order("o-1");
        repo.save(&order).await.unwrap();
        assert!(repo.save(&order).await.unwrap_err().is_conflict());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_status_is_never_persisted() {
        let repo = InMemoryOrderRepository::new();
        let mut order = order("o-1");
        order.status = OrderStatus::Unknown;
        assert!(matches!(
            repo.save(&order).await,
            Err(OrderError::ValidationError(_))
        ));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_payment_repository_enforces_single_active_payment() {
        let repo = InMemoryPaymentRepository::new();
        let order_id = OrderId::new("o-1");

        let mut first = payment(&order_id, 1);
        first.version = repo.save(&first).await.unwrap();

        let second = payment(&order_id, 2);
        assert!(matches!(
            repo.save(&second).await,
            Err(OrderError::DuplicateActivePayment { .. })
        ));

        // Once the first attempt fails, a new attempt may be opened.
        first.fail().unwrap();
        repo.save(&first).await.unwrap();
        repo.save(&second).await.unwrap();

        let active = repo.find_by_order_id(&order_id).await.unwrap();
        assert_eq!(active.id, second.id);

        let history = repo.list_by_order_id(&order_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first.id);
        assert_eq!(history[0].status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_payment_lookup_skips_failed_attempts() {
        let repo = InMemoryPaymentRepository::new();
        let order_id = OrderId::new("o-1");

        let mut failed = payment(&order_id, 1);
        failed.version = repo.save(&failed).await.unwrap();
        failed.fail().unwrap();
        repo.save(&failed).await.unwrap();

        assert!(matches!(
            repo.find_by_order_id(&order_id).await,
            Err(OrderError::PaymentNotFound(_))
        ));
        assert!(repo.find_by_id(&failed.id).await.is_ok());
    }
}
