//! JSON shapes printed by the command-line boundary.
//!
//! Amounts are rendered as major-unit strings (`"2.00"`) so no consumer ever sees a
//! float or has to know the minor-unit scale.

use crate::application::orchestrator::PaymentReceipt;
use crate::domain::order::{LineItem, Order};
use crate::domain::payment::Payment;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LineItemView {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: String,
    pub subtotal: String,
}

impl From<&LineItem> for LineItemView {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
            subtotal: item.subtotal.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub total_amount: String,
    pub items: Vec<LineItemView>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentView>,
}

impl OrderView {
    pub fn new(order: &Order, payment: Option<&Payment>) -> Self {
        Self {
            id: order.id.to_string(),
            customer_id: order.customer_id.clone(),
            status: order.status.to_string(),
            total_amount: order.total_amount.to_string(),
            items: order.items.iter().map(LineItemView::from).collect(),
            version: order.version,
            created_at: order.created_at,
            updated_at: order.updated_at,
            payment: payment.map(PaymentView::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: String,
    pub status: String,
    pub amount: String,
    pub currency: String,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentView {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            status: payment.status.to_string(),
            amount: payment.amount.to_string(),
            currency: payment.currency.clone(),
            channel: payment.channel.to_string(),
            transaction_id: payment.transaction_id.clone(),
            completed_at: payment.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedView {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReceiptView {
    pub order_id: String,
    pub payment_id: String,
    pub status: String,
    pub reused: bool,
}

impl From<&PaymentReceipt> for ReceiptView {
    fn from(receipt: &PaymentReceipt) -> Self {
        Self {
            order_id: receipt.order_id.to_string(),
            payment_id: receipt.payment_id.to_string(),
            status: receipt.status.to_string(),
            reused: receipt.reused,
        }
    }
}
