use super::money::Money;
use super::order::{Order, OrderId};
use super::payment::{Payment, PaymentId, PaymentStatus};
use super::product::{ProductQuery, ProductVerdict};
use crate::error::Result;
use async_trait::async_trait;

/// Persistence port for the order aggregate.
///
/// `save` is an atomic upsert of the order and its complete item set. It succeeds only
/// when the stored version equals `order.version` (0 meaning "not stored yet") and
/// returns the new version; otherwise it fails with `OptimisticLockConflict` and leaves
/// the stored record untouched.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: &Order) -> Result<u64>;
    /// Fails with `OrderNotFound` when the order does not exist.
    async fn find_by_id(&self, id: &OrderId) -> Result<Order>;
}

/// Persistence port for the payment aggregate.
///
/// Same version contract as [`OrderRepository::save`]. Inserting a payment while the
/// order already has an active one fails with `DuplicateActivePayment`.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn save(&self, payment: &Payment) -> Result<u64>;
    /// Fails with `PaymentNotFound` when the payment does not exist.
    async fn find_by_id(&self, id: &PaymentId) -> Result<Payment>;
    /// Most recent payment of the order that did not fail; `PaymentNotFound` otherwise.
    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Payment>;
    /// Every payment of the order, oldest attempt first.
    async fn list_by_order_id(&self, order_id: &OrderId) -> Result<Vec<Payment>>;
}

/// External product catalog consulted before an order is accepted.
#[async_trait]
pub trait ProductValidator: Send + Sync {
    async fn validate_product(&self, query: &ProductQuery) -> Result<ProductVerdict>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub order_id: OrderId,
    /// Passed to the gateway as its idempotency reference.
    pub payment_id: PaymentId,
    pub amount: Money,
    pub currency: String,
}

/// External payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures the amount and returns the gateway transaction ID.
    async fn create_payment(&self, request: &ChargeRequest) -> Result<String>;
    async fn query_payment_status(&self, payment_id: &PaymentId) -> Result<PaymentStatus>;
}

pub type OrderRepositoryBox = Box<dyn OrderRepository>;
pub type PaymentRepositoryBox = Box<dyn PaymentRepository>;
pub type ProductValidatorBox = Box<dyn ProductValidator>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
