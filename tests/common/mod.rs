#![allow(dead_code)]

use async_trait::async_trait;
use orderflow::application::orchestrator::{NewOrder, OrderLine, OrderOrchestrator, PaymentDefaults};
use orderflow::domain::money::Money;
use orderflow::domain::order::OrderId;
use orderflow::domain::payment::{Payment, PaymentId};
use orderflow::domain::ports::{PaymentRepository, ProductValidatorBox};
use orderflow::domain::product::{Product, ProductStatus};
use orderflow::error::{OrderError, Result};
use orderflow::infrastructure::catalog::InMemoryCatalog;
use orderflow::infrastructure::gateway::{GatewayBehavior, SimulatedGateway};
use orderflow::infrastructure::in_memory::{InMemoryOrderRepository, InMemoryPaymentRepository};
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// An orchestrator wired to in-memory fakes, with handles kept for inspection.
pub struct Harness {
    pub orchestrator: Arc<OrderOrchestrator>,
    pub orders: InMemoryOrderRepository,
    pub payments: InMemoryPaymentRepository,
    pub gateway: SimulatedGateway,
}

pub fn harness(behavior: GatewayBehavior) -> Harness {
    harness_with(behavior, Box::new(catalog()))
}

pub fn harness_with(behavior: GatewayBehavior, products: ProductValidatorBox) -> Harness {
    let orders = InMemoryOrderRepository::new();
    let payments = InMemoryPaymentRepository::new();
    let gateway = SimulatedGateway::new(behavior);
    let orchestrator = OrderOrchestrator::new(
        Box::new(orders.clone()),
        Box::new(payments.clone()),
        products,
        Box::new(gateway.clone()),
        PaymentDefaults::default(),
    );
    Harness {
        orchestrator: Arc::new(orchestrator),
        orders,
        payments,
        gateway,
    }
}

pub fn product(id: &str, price: i64, status: ProductStatus) -> Product {
    Product {
        id: id.to_string(),
        name: format!("Product {}", id),
        price: Money::from_minor(price),
        status,
    }
}

/// P1 at 1.00, P2 at 2.50, P3 out of stock, P4 deleted.
pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::closed([
        product("P1", 100, ProductStatus::Valid),
        product("P2", 250, ProductStatus::Valid),
        product("P3", 500, ProductStatus::OutOfStock),
        product("P4", 700, ProductStatus::Deleted),
    ])
}

pub fn line(product_id: &str, quantity: i64, unit_price: i64) -> OrderLine {
    OrderLine {
        product_id: product_id.to_string(),
        quantity,
        unit_price: Money::from_minor(unit_price),
    }
}

pub fn new_order(lines: Vec<OrderLine>) -> NewOrder {
    NewOrder {
        customer_id: "c-1".to_string(),
        lines,
        idempotency_key: None,
    }
}

/// Payment repository whose writes can be switched to fail, for exercising
/// best-effort error paths.
#[derive(Clone, Default)]
pub struct FlakyPaymentRepository {
    pub inner: InMemoryPaymentRepository,
    pub write_failure: Arc<AtomicBool>,
}

impl FlakyPaymentRepository {
    pub fn fail_writes(&self, fail: bool) {
        self.write_failure.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentRepository for FlakyPaymentRepository {
    async fn save(&self, payment: &Payment) -> Result<u64> {
        if self.write_failure.load(Ordering::SeqCst) {
            return Err(OrderError::StorageError {
                step: "save payment",
                message: "connection reset".to_string(),
            });
        }
        self.inner.save(payment).await
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Payment> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_order_id(&self, order_id: &OrderId) -> Result<Payment> {
        self.inner.find_by_order_id(order_id).await
    }

    async fn list_by_order_id(&self, order_id: &OrderId) -> Result<Vec<Payment>> {
        self.inner.list_by_order_id(order_id).await
    }
}

pub fn write_items_csv(path: &Path, rows: &[(&str, i64, &str)]) -> std::result::Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["product_id", "quantity", "unit_price"])?;
    for (product_id, quantity, unit_price) in rows {
        wtr.write_record([*product_id, quantity.to_string().as_str(), *unit_price])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_catalog_csv(path: &Path, rows: &[(&str, &str, &str, &str)]) -> std::result::Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["product_id", "name", "price", "status"])?;
    for (id, name, price, status) in rows {
        wtr.write_record([*id, *name, *price, *status])?;
    }
    wtr.flush()?;
    Ok(())
}
