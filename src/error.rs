use crate::domain::order::OrderStatus;
use crate::domain::payment::PaymentStatus;
use crate::domain::product::ProductStatus;
use miette::Diagnostic;
use thiserror::Error;

/// Every failure the order and payment workflows can surface.
///
/// Variants are grouped by how a caller is expected to react: input rejections are
/// final, `OptimisticLockConflict` asks for reload-and-retry, `PaymentAlreadySettled`
/// is a no-op signal and transport failures carry the step that failed.
#[derive(Error, Diagnostic, Debug)]
pub enum OrderError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(orderflow::validation))]
    ValidationError(String),

    #[error("Product {product_id} rejected: {message}")]
    #[diagnostic(code(orderflow::product_invalid))]
    ProductInvalid { product_id: String, message: String },

    #[error("Product {product_id} is not available (status: {status})")]
    #[diagnostic(code(orderflow::product_unavailable))]
    ProductUnavailable {
        product_id: String,
        status: ProductStatus,
    },

    #[error("Order {0} not found")]
    #[diagnostic(code(orderflow::order_not_found))]
    OrderNotFound(String),

    #[error("Payment not found for {0}")]
    #[diagnostic(code(orderflow::payment_not_found))]
    PaymentNotFound(String),

    #[error("Order cannot move from {from} to {to}")]
    #[diagnostic(code(orderflow::invalid_transition))]
    InvalidStateTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order {order_id} is {status}; cannot {operation}")]
    #[diagnostic(code(orderflow::invalid_order_state))]
    InvalidOrderState {
        order_id: String,
        status: OrderStatus,
        operation: &'static str,
    },

    #[error("Payment {payment_id} is {status}; cannot {operation}")]
    #[diagnostic(code(orderflow::invalid_payment_state))]
    InvalidPaymentState {
        payment_id: String,
        status: PaymentStatus,
        operation: &'static str,
    },

    #[error("Version conflict on {id}: expected version {expected}, stored version {actual}")]
    #[diagnostic(
        code(orderflow::conflict),
        help("the record was modified concurrently; reload it and retry")
    )]
    OptimisticLockConflict { id: String, expected: u64, actual: u64 },

    #[error("Order {order_id} already has an active payment {payment_id}")]
    #[diagnostic(code(orderflow::duplicate_active_payment))]
    DuplicateActivePayment { order_id: String, payment_id: String },

    #[error("Order {order_id} is already settled by payment {payment_id}")]
    #[diagnostic(code(orderflow::already_settled))]
    PaymentAlreadySettled { order_id: String, payment_id: String },

    #[error("Gateway error during {step}: {message}")]
    #[diagnostic(code(orderflow::gateway))]
    GatewayError { step: &'static str, message: String },

    #[error("Storage error during {step}: {message}")]
    #[diagnostic(code(orderflow::storage))]
    StorageError { step: &'static str, message: String },

    #[error("{step} was cancelled")]
    #[diagnostic(code(orderflow::cancelled))]
    Cancelled { step: &'static str },

    #[error("{step} exceeded its deadline")]
    #[diagnostic(code(orderflow::deadline_exceeded))]
    DeadlineExceeded { step: &'static str },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl OrderError {
    /// True when the caller should reload the aggregate and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, OrderError::OptimisticLockConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            OrderError::OrderNotFound(_) | OrderError::PaymentNotFound(_)
        )
    }

    /// Process exit code used by the command-line boundary.
    pub fn exit_code(&self) -> u8 {
        match self {
            OrderError::PaymentAlreadySettled { .. } => 0,
            OrderError::OptimisticLockConflict { .. }
            | OrderError::DuplicateActivePayment { .. } => 3,
            OrderError::OrderNotFound(_) | OrderError::PaymentNotFound(_) => 4,
            OrderError::ValidationError(_)
            | OrderError::ProductInvalid { .. }
            | OrderError::ProductUnavailable { .. }
            | OrderError::InvalidStateTransition { .. }
            | OrderError::InvalidOrderState { .. }
            | OrderError::InvalidPaymentState { .. }
            | OrderError::CsvError(_) => 5,
            OrderError::Cancelled { .. } | OrderError::DeadlineExceeded { .. } => 6,
            _ => 1,
        }
    }
}

pub type Result<T, E = OrderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_distinct_from_storage_failures() {
        let conflict = OrderError::OptimisticLockConflict {
            id: "o-1".to_string(),
            expected: 1,
            actual: 2,
        };
        let storage = OrderError::StorageError {
            step: "save order",
            message: "disk full".to_string(),
        };

        assert!(conflict.is_conflict());
        assert!(!storage.is_conflict());
        assert_eq!(conflict.exit_code(), 3);
        assert_eq!(storage.exit_code(), 1);
    }

    #[test]
    fn test_not_found_exit_code() {
        let err = OrderError::OrderNotFound("o-404".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "Order o-404 not found");
    }

    #[test]
    fn test_settled_is_not_an_alarm() {
        let err = OrderError::PaymentAlreadySettled {
            order_id: "o-1".to_string(),
            payment_id: "pay-o-1-0001".to_string(),
        };
        assert_eq!(err.exit_code(), 0);
    }
}
