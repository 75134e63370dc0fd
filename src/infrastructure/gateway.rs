use crate::domain::payment::{PaymentId, PaymentStatus};
use crate::domain::ports::{ChargeRequest, PaymentGateway};
use crate::error::{OrderError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// How the simulated gateway answers charge requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum GatewayBehavior {
    /// Captures every charge.
    #[default]
    Approve,
    /// Rejects every charge.
    Decline,
    /// Never answers; only a deadline or cancellation ends the call.
    Hang,
}

/// In-process stand-in for a payment provider.
///
/// Charges are idempotent on the payment ID: charging the same payment twice returns
/// the transaction ID of the first capture. Clones share state, so a test can keep a
/// handle to inspect calls after boxing the gateway into a service.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    behavior: GatewayBehavior,
    calls: Arc<AtomicUsize>,
    captured: Arc<Mutex<HashMap<PaymentId, String>>>,
    reported: Arc<Mutex<HashMap<PaymentId, PaymentStatus>>>,
}

impl SimulatedGateway {
    pub fn new(behavior: GatewayBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Number of `create_payment` calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transaction ID captured for a payment, if any.
    pub async fn transaction_for(&self, payment_id: &PaymentId) -> Option<String> {
        self.captured.lock().await.get(payment_id).cloned()
    }

    /// Forces the status returned by `query_payment_status` for one payment.
    pub async fn report_status(&self, payment_id: &PaymentId, status: PaymentStatus) {
        self.reported.lock().await.insert(payment_id.clone(), status);
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_payment(&self, request: &ChargeRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            payment_id = %request.payment_id,
            amount = %request.amount,
            currency = %request.currency,
            "Simulated gateway received charge"
        );

        match self.behavior {
            GatewayBehavior::Approve => {
                let mut captured = self.captured.lock().await;
                let transaction_id = captured
                    .entry(request.payment_id.clone())
                    .or_insert_with(|| format!("tx-{}", Uuid::new_v4().simple()))
                    .clone();
                Ok(transaction_id)
            }
            GatewayBehavior::Decline => Err(OrderError::GatewayError {
                step: "gateway charge",
                message: format!("payment {} declined", request.payment_id),
            }),
            GatewayBehavior::Hang => std::future::pending().await,
        }
    }

    async fn query_payment_status(&self, payment_id: &PaymentId) -> Result<PaymentStatus> {
        if let Some(status) = self.reported.lock().await.get(payment_id) {
            return Ok(*status);
        }
        if self.captured.lock().await.contains_key(payment_id) {
            return Ok(PaymentStatus::Completed);
        }
        Ok(PaymentStatus::Created)
    }
}
