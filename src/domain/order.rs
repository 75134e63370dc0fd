use super::money::Money;
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Opaque, globally unique order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Derives a stable identifier from a client-supplied idempotency key, scoped to
    /// the customer so two customers can reuse the same key.
    pub fn from_idempotency_key(customer_id: &str, key: &str) -> Self {
        let name = format!("{}\u{1f}{}", customer_id, key);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle of an order.
///
/// `created → pending → paid → shipped → completed`, with `created → cancelled` and
/// `paid → cancelled`. `Unknown` marks malformed records and is never persisted.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum OrderStatus {
    Unknown,
    Created,
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Unknown,
        OrderStatus::Created,
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unknown => "unknown",
            OrderStatus::Created => "created",
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Decodes a stored status; anything unrecognized becomes `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => OrderStatus::Created,
            "pending" => OrderStatus::Pending,
            "paid" => OrderStatus::Paid,
            "shipped" => OrderStatus::Shipped,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            _ => OrderStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(OrderStatus::parse(&raw))
    }
}

/// One product entry within an order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl LineItem {
    /// Builds a line item whose subtotal is `quantity × unit_price`.
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Money) -> Result<Self> {
        let product_id = product_id.into();
        let subtotal = unit_price.checked_mul(quantity).ok_or_else(|| {
            OrderError::ValidationError(format!("Subtotal overflow for product {}", product_id))
        })?;
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            subtotal,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            return Err(OrderError::ValidationError(
                "Product ID must not be empty".to_string(),
            ));
        }
        if self.quantity <= 0 {
            return Err(OrderError::ValidationError(format!(
                "Quantity for product {} must be greater than zero",
                self.product_id
            )));
        }
        if self.unit_price.is_negative() {
            return Err(OrderError::ValidationError(format!(
                "Unit price for product {} must not be negative",
                self.product_id
            )));
        }
        if self.unit_price.checked_mul(self.quantity) != Some(self.subtotal) {
            return Err(OrderError::ValidationError(format!(
                "Subtotal for product {} does not equal quantity × unit price",
                self.product_id
            )));
        }
        Ok(())
    }
}

/// The order aggregate root.
///
/// All mutators are pure and in-memory; persistence happens through the order
/// repository. `version` is 0 until the first successful save and is otherwise owned
/// by the storage layer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Order {
    /// Creates an unsaved order in status `created` with its total already computed.
    ///
    /// Fails with `ValidationError` when the line subtotals do not fit in one amount.
    pub fn new(id: OrderId, customer_id: impl Into<String>, items: Vec<LineItem>) -> Result<Self> {
        let now = Utc::now();
        let mut order = Self {
            id,
            customer_id: customer_id.into(),
            items,
            status: OrderStatus::Created,
            total_amount: Money::ZERO,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        order.calculate_total_amount()?;
        Ok(order)
    }

    /// Business rules checked before the first persistence.
    pub fn validate(&self) -> Result<()> {
        if self.customer_id.trim().is_empty() {
            return Err(OrderError::ValidationError(
                "Customer ID must not be empty".to_string(),
            ));
        }
        if self.items.is_empty() {
            return Err(OrderError::ValidationError(
                "Order must contain at least one line item".to_string(),
            ));
        }
        self.validate_items()
    }

    /// Business rules checked before persisting an existing order.
    pub fn validate_update(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(OrderError::ValidationError(
                "Order ID must not be empty".to_string(),
            ));
        }
        if self.status == OrderStatus::Unknown {
            return Err(OrderError::ValidationError(format!(
                "Order {} has an unknown status",
                self.id
            )));
        }
        self.validate_items()
    }

    fn validate_items(&self) -> Result<()> {
        for item in &self.items {
            item.validate()?;
        }
        let calculated = sum_subtotals(&self.id, &self.items)?;
        if calculated != self.total_amount {
            return Err(OrderError::ValidationError(format!(
                "Order total {} does not match the sum of line items {}",
                self.total_amount, calculated
            )));
        }
        Ok(())
    }

    pub fn can_be_cancelled(&self) -> bool {
        matches!(self.status, OrderStatus::Created | OrderStatus::Paid)
    }

    pub fn cancel(&mut self) -> Result<()> {
        if !self.can_be_cancelled() {
            return Err(self.invalid_transition(OrderStatus::Cancelled));
        }
        self.transition_to(OrderStatus::Cancelled);
        Ok(())
    }

    pub fn mark_as_pending_payment(&mut self) -> Result<()> {
        self.advance(OrderStatus::Created, OrderStatus::Pending)
    }

    pub fn mark_as_paid(&mut self) -> Result<()> {
        self.advance(OrderStatus::Pending, OrderStatus::Paid)
    }

    pub fn mark_as_shipped(&mut self) -> Result<()> {
        self.advance(OrderStatus::Paid, OrderStatus::Shipped)
    }

    pub fn complete(&mut self) -> Result<()> {
        self.advance(OrderStatus::Shipped, OrderStatus::Completed)
    }

    /// Swaps the item set of a not-yet-paid order and recomputes the total.
    pub fn replace_items(&mut self, items: Vec<LineItem>) -> Result<()> {
        if self.status != OrderStatus::Created {
            return Err(OrderError::InvalidOrderState {
                order_id: self.id.to_string(),
                status: self.status,
                operation: "replace line items",
            });
        }
        if items.is_empty() {
            return Err(OrderError::ValidationError(
                "Order must contain at least one line item".to_string(),
            ));
        }
        self.total_amount = sum_subtotals(&self.id, &items)?;
        self.items = items;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Recomputes the total from the current line items.
    pub fn calculate_total_amount(&mut self) -> Result<()> {
        self.total_amount = sum_subtotals(&self.id, &self.items)?;
        Ok(())
    }

    fn advance(&mut self, from: OrderStatus, to: OrderStatus) -> Result<()> {
        if self.status != from {
            return Err(self.invalid_transition(to));
        }
        self.transition_to(to);
        Ok(())
    }

    fn transition_to(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    fn invalid_transition(&self, to: OrderStatus) -> OrderError {
        OrderError::InvalidStateTransition {
            from: self.status,
            to,
        }
    }
}

fn sum_subtotals(order_id: &OrderId, items: &[LineItem]) -> Result<Money> {
    items.iter().try_fold(Money::ZERO, |total, item| {
        total.checked_add(item.subtotal).ok_or_else(|| {
            OrderError::ValidationError(format!("Order {} total overflows", order_id))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product: &str, quantity: i64, unit_price: i64) -> LineItem {
        LineItem::new(product, quantity, Money::from_minor(unit_price)).unwrap()
    }

    fn order_in(status: OrderStatus) -> Order {
        let mut order = Order::new(OrderId::new("o-1"), "c-1", vec![item("P1", 2, 100)]).unwrap();
        order.status = status;
        order
    }

    #[test]
    fn test_new_order_totals_line_items() {
        let order = Order::new(
            OrderId::new("o-1"),
            "c-1",
            vec![item("P1", 2, 100), item("P2", 1, 350)],
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.total_amount, Money::from_minor(550));
        assert_eq!(order.version, 0);
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_orders() {
        let mut no_customer = order_in(OrderStatus::Created);
        no_customer.customer_id = " ".to_string();
        assert!(matches!(
            no_customer.validate(),
            Err(OrderError::ValidationError(_))
        ));

        let empty = Order::new(OrderId::new("o-2"), "c-1", vec![]).unwrap();
        assert!(matches!(empty.validate(), Err(OrderError::ValidationError(_))));

        let mut zero_quantity = order_in(OrderStatus::Created);
        zero_quantity.items[0].quantity = 0;
        zero_quantity.items[0].subtotal = Money::ZERO;
        zero_quantity.calculate_total_amount().unwrap();
        assert!(zero_quantity.validate().is_err());

        let mut blank_product = order_in(OrderStatus::Created);
        blank_product.items[0].product_id = String::new();
        assert!(blank_product.validate().is_err());

        let mut negative_price = order_in(OrderStatus::Created);
        negative_price.items[0].unit_price = Money::from_minor(-1);
        negative_price.items[0].subtotal = Money::from_minor(-2);
        negative_price.calculate_total_amount().unwrap();
        assert!(negative_price.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_total_mismatch() {
        let mut order = order_in(OrderStatus::Created);
        order.total_amount = Money::from_minor(199);
        assert!(matches!(order.validate(), Err(OrderError::ValidationError(_))));

        order.calculate_total_amount().unwrap();
        assert_eq!(order.total_amount, Money::from_minor(200));
        assert!(order.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inconsistent_subtotal() {
        let mut order = order_in(OrderStatus::Created);
        order.items[0].subtotal = Money::from_minor(150);
        order.calculate_total_amount().unwrap();
        assert!(order.validate().is_err());
    }

    #[test]
    fn test_total_overflow_is_a_validation_error() {
        let max = || item("P1", 1, i64::MAX);
        let result = Order::new(OrderId::new("o-1"), "c-1", vec![max(), max()]);
        assert!(matches!(result, Err(OrderError::ValidationError(_))));

        let mut order = order_in(OrderStatus::Created);
        assert!(matches!(
            order.replace_items(vec![max(), max()]),
            Err(OrderError::ValidationError(_))
        ));
        assert_eq!(order.items, vec![item("P1", 2, 100)]);
        assert_eq!(order.total_amount, Money::from_minor(200));
    }

    #[test]
    fn test_line_item_overflow_is_a_validation_error() {
        let result = LineItem::new("P1", i64::MAX, Money::from_minor(2));
        assert!(matches!(result, Err(OrderError::ValidationError(_))));
    }

    #[test]
    fn test_cancel_only_from_created_or_paid() {
        for status in OrderStatus::ALL {
            let mut order = order_in(status);
            let result = order.cancel();
            if matches!(status, OrderStatus::Created | OrderStatus::Paid) {
                assert!(result.is_ok(), "cancel from {status} should succeed");
                assert_eq!(order.status, OrderStatus::Cancelled);
            } else {
                assert!(
                    matches!(result, Err(OrderError::InvalidStateTransition { from, .. }) if from == status),
                    "cancel from {status} should fail"
                );
                assert_eq!(order.status, status);
            }
        }
    }

    #[test]
    fn test_cancel_bumps_updated_at() {
        let mut order = order_in(OrderStatus::Created);
        let before = order.updated_at;
        order.cancel().unwrap();
        assert!(order.updated_at >= before);
    }

    #[test]
    fn test_forward_transitions_need_their_source_state() {
        for status in OrderStatus::ALL {
            let mut order = order_in(status);
            assert_eq!(
                order.mark_as_pending_payment().is_ok(),
                status == OrderStatus::Created
            );

            let mut order = order_in(status);
            assert_eq!(order.mark_as_paid().is_ok(), status == OrderStatus::Pending);

            let mut order = order_in(status);
            assert_eq!(order.mark_as_shipped().is_ok(), status == OrderStatus::Paid);

            let mut order = order_in(status);
            assert_eq!(order.complete().is_ok(), status == OrderStatus::Shipped);
        }
    }

    #[test]
    fn test_full_happy_path() {
        let mut order = order_in(OrderStatus::Created);
        order.mark_as_pending_payment().unwrap();
        order.mark_as_paid().unwrap();
        order.mark_as_shipped().unwrap();
        order.complete().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.status.is_terminal());
    }

    #[test]
    fn test_replace_items_recalculates_total() {
        let mut order = order_in(OrderStatus::Created);
        order.replace_items(vec![item("P9", 3, 250)]).unwrap();
        assert_eq!(order.total_amount, Money::from_minor(750));
        assert!(order.validate_update().is_ok());

        let mut pending = order_in(OrderStatus::Pending);
        assert!(matches!(
            pending.replace_items(vec![item("P9", 1, 1)]),
            Err(OrderError::InvalidOrderState { .. })
        ));
        assert!(order.replace_items(vec![]).is_err());
    }

    #[test]
    fn test_validate_update_rejects_unknown_status() {
        let order = order_in(OrderStatus::Unknown);
        assert!(matches!(
            order.validate_update(),
            Err(OrderError::ValidationError(_))
        ));
    }

    #[test]
    fn test_status_serde_maps_unrecognized_to_unknown() {
        let json = serde_json::to_string(&OrderStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let parsed: OrderStatus = serde_json::from_str("\"teleported\"").unwrap();
        assert_eq!(parsed, OrderStatus::Unknown);
    }

    #[test]
    fn test_idempotency_key_ids_are_stable_and_customer_scoped() {
        let a = OrderId::from_idempotency_key("c-1", "k-1");
        let b = OrderId::from_idempotency_key("c-1", "k-1");
        let c = OrderId::from_idempotency_key("c-2", "k-1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
