use super::money::Money;
use super::order::OrderId;
use crate::error::{OrderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment identifier, `pay-{order_id}-{attempt}`.
///
/// Deterministic per (order, attempt) so that two writers racing to open the same
/// attempt collide on the key instead of producing two payments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_attempt(order_id: &OrderId, attempt: usize) -> Self {
        Self(format!("{}{:04}", Self::order_prefix(order_id), attempt))
    }

    /// Key prefix shared by every payment attempt of an order.
    pub fn order_prefix(order_id: &OrderId) -> String {
        format!("pay-{}-", order_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Created,
    /// Submitted and awaiting gateway confirmation.
    Pending,
    Completed,
    Failed,
    Refunding,
    RefundedSuccess,
    RefundFailed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Created => "created",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunding => "refunding",
            PaymentStatus::RefundedSuccess => "refunded_success",
            PaymentStatus::RefundFailed => "refund_failed",
        }
    }

    /// Created or awaiting confirmation: money may still move.
    pub fn is_active(&self) -> bool {
        matches!(self, PaymentStatus::Created | PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentChannel {
    #[default]
    Alipay,
    Wechat,
    Card,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentChannel::Alipay => "alipay",
            PaymentChannel::Wechat => "wechat",
            PaymentChannel::Card => "card",
        }
    }
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentChannel {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alipay" => Ok(PaymentChannel::Alipay),
            "wechat" => Ok(PaymentChannel::Wechat),
            "card" => Ok(PaymentChannel::Card),
            other => Err(OrderError::ValidationError(format!(
                "Unknown payment channel '{}'",
                other
            ))),
        }
    }
}

/// The payment aggregate root.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    pub channel: PaymentChannel,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub refund_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl Payment {
    /// Opens a new payment attempt in status `created`.
    pub fn new(
        id: PaymentId,
        order_id: OrderId,
        amount: Money,
        currency: impl Into<String>,
        channel: PaymentChannel,
    ) -> Result<Self> {
        if amount.is_negative() {
            return Err(OrderError::ValidationError(format!(
                "Payment amount for order {} must not be negative",
                order_id
            )));
        }
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(OrderError::ValidationError(
                "Payment currency must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id,
            order_id,
            amount,
            currency,
            channel,
            status: PaymentStatus::Created,
            transaction_id: None,
            refund_transaction_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            version: 0,
        })
    }

    /// Gateway confirmed the capture.
    pub fn complete(&mut self, transaction_id: impl Into<String>) -> Result<()> {
        self.ensure_active("complete")?;
        let now = Utc::now();
        self.status = PaymentStatus::Completed;
        self.transaction_id = Some(transaction_id.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self) -> Result<()> {
        self.ensure_active("fail")?;
        self.status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_awaiting_confirmation(&mut self) -> Result<()> {
        self.ensure(PaymentStatus::Created, "await confirmation")?;
        self.status = PaymentStatus::Pending;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start_refund(&mut self) -> Result<()> {
        self.ensure(PaymentStatus::Completed, "start a refund")?;
        self.status = PaymentStatus::Refunding;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn finish_refund(&mut self, refund_transaction_id: Option<String>, success: bool) -> Result<()> {
        self.ensure(PaymentStatus::Refunding, "finish a refund")?;
        self.status = if success {
            PaymentStatus::RefundedSuccess
        } else {
            PaymentStatus::RefundFailed
        };
        self.refund_transaction_id = refund_transaction_id;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_active(&self, operation: &'static str) -> Result<()> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn ensure(&self, expected: PaymentStatus, operation: &'static str) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    fn invalid_state(&self, operation: &'static str) -> OrderError {
        OrderError::InvalidPaymentState {
            payment_id: self.id.to_string(),
            status: self.status,
            operation,
        }
    }
}
