use super::money::Money;
use super::order::OrderId;
use super::payment::{Payment, PaymentChannel, PaymentId, PaymentStatus};
use super::ports::{ChargeRequest, PaymentGatewayBox, PaymentRepositoryBox};
use crate::context::RequestContext;
use crate::error::{OrderError, Result};

/// Creates, charges and finalizes payment records.
///
/// All gateway outcomes are written through [`PaymentService::process_payment_result`],
/// so the completed/failed transitions have a single write path.
pub struct PaymentService {
    repo: PaymentRepositoryBox,
    gateway: PaymentGatewayBox,
}

impl PaymentService {
    pub fn new(repo: PaymentRepositoryBox, gateway: PaymentGatewayBox) -> Self {
        Self { repo, gateway }
    }

    /// Opens the next payment attempt for an order.
    ///
    /// Fails with `DuplicateActivePayment` unless every earlier attempt failed. The ID
    /// is derived from the number of attempts already recorded, so two callers racing
    /// to open the same attempt collide on the key.
    pub async fn create_payment(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        amount: Money,
        currency: &str,
        channel: PaymentChannel,
    ) -> Result<Payment> {
        let history = ctx
            .run("list payments", self.repo.list_by_order_id(order_id))
            .await?;
        // Only a failed attempt may be followed by another one.
        if let Some(open) = history
            .iter()
            .rev()
            .find(|p| p.status != PaymentStatus::Failed)
        {
            return Err(OrderError::DuplicateActivePayment {
                order_id: order_id.to_string(),
                payment_id: open.id.to_string(),
            });
        }
        let id = PaymentId::for_attempt(order_id, history.len() + 1);
        let mut payment = Payment::new(id, order_id.clone(), amount, currency, channel)?;
        payment.version = ctx
            .run("save new payment", self.repo.save(&payment))
            .await?;
        tracing::debug!(payment_id = %payment.id, order_id = %order_id, "Payment created");
        Ok(payment)
    }

    /// Records a gateway outcome on a payment that is still active.
    pub async fn process_payment_result(
        &self,
        ctx: &RequestContext,
        payment_id: &PaymentId,
        transaction_id: &str,
        success: bool,
    ) -> Result<Payment> {
        let mut payment = ctx
            .run("find payment", self.repo.find_by_id(payment_id))
            .await?;
        if success {
            payment.complete(transaction_id)?;
        } else {
            payment.fail()?;
        }
        payment.version = ctx.run("save payment", self.repo.save(&payment)).await?;
        Ok(payment)
    }

    pub async fn get_payment(&self, ctx: &RequestContext, id: &PaymentId) -> Result<Payment> {
        ctx.run("find payment", self.repo.find_by_id(id)).await
    }

    /// Most recent payment of the order that did not fail.
    pub async fn get_payment_by_order_id(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Payment> {
        ctx.run("find order payment", self.repo.find_by_order_id(order_id))
            .await
    }

    pub async fn payment_history(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Vec<Payment>> {
        ctx.run("list payments", self.repo.list_by_order_id(order_id))
            .await
    }

    /// Submits an active payment to the gateway and records the outcome.
    ///
    /// A gateway rejection marks the payment failed (best effort) and returns the
    /// gateway error. Cancellation or an expired deadline leaves the payment untouched:
    /// the charge may or may not have reached the provider, and a retry reuses the same
    /// payment ID as the gateway's idempotency reference.
    pub async fn charge(&self, ctx: &RequestContext, payment: &Payment) -> Result<Payment> {
        if !payment.status.is_active() {
            return Err(OrderError::InvalidPaymentState {
                payment_id: payment.id.to_string(),
                status: payment.status,
                operation: "charge",
            });
        }

        let request = ChargeRequest {
            order_id: payment.order_id.clone(),
            payment_id: payment.id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
        };

        match ctx
            .run("gateway charge", self.gateway.create_payment(&request))
            .await
        {
            Ok(transaction_id) => {
                self.process_payment_result(ctx, &payment.id, &transaction_id, true)
                    .await
            }
            Err(err @ (OrderError::Cancelled { .. } | OrderError::DeadlineExceeded { .. })) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    error = %err,
                    "Charge outcome unknown; payment left open for retry"
                );
                Err(err)
            }
            Err(err) => {
                if let Err(secondary) = self
                    .process_payment_result(ctx, &payment.id, "", false)
                    .await
                {
                    tracing::error!(
                        payment_id = %payment.id,
                        error = %secondary,
                        "Failed to record failed payment after gateway error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Pulls the payment status from the gateway and applies it locally.
    pub async fn reconcile(&self, ctx: &RequestContext, payment: &Payment) -> Result<Payment> {
        let status = ctx
            .run(
                "gateway status query",
                self.gateway.query_payment_status(&payment.id),
            )
            .await?;
        tracing::debug!(payment_id = %payment.id, gateway_status = %status, "Reconciling payment");

        match status {
            PaymentStatus::Completed => {
                // The status query does not return a transaction; fall back to the
                // payment ID, which is the reference the gateway knows it by.
                let transaction_id = payment
                    .transaction_id
                    .clone()
                    .unwrap_or_else(|| payment.id.to_string());
                self.process_payment_result(ctx, &payment.id, &transaction_id, true)
                    .await
            }
            PaymentStatus::Failed => {
                self.process_payment_result(ctx, &payment.id, "", false)
                    .await
            }
            PaymentStatus::Pending if payment.status == PaymentStatus::Created => {
                let mut payment = payment.clone();
                payment.mark_awaiting_confirmation()?;
                payment.version = ctx.run("save payment", self.repo.save(&payment)).await?;
                Ok(payment)
            }
            PaymentStatus::Pending | PaymentStatus::Created => Ok(payment.clone()),
            other => Err(OrderError::GatewayError {
                step: "gateway status query",
                message: format!("unexpected status {} for payment {}", other, payment.id),
            }),
        }
    }
}
