use crate::context::RequestContext;
use crate::domain::money::Money;
use crate::domain::order::{LineItem, Order, OrderId, OrderStatus};
use crate::domain::order_service::OrderService;
use crate::domain::payment::{Payment, PaymentChannel, PaymentId, PaymentStatus};
use crate::domain::payment_service::PaymentService;
use crate::domain::ports::{
    OrderRepositoryBox, PaymentGatewayBox, PaymentRepositoryBox, ProductValidatorBox,
};
use crate::domain::product::{ProductQuery, ProductStatus};
use crate::error::{OrderError, Result};
use serde::Serialize;

/// One line of an incoming order as quoted by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_id: String,
    pub lines: Vec<OrderLine>,
    /// Makes the create replayable: the same (customer, key) always maps to the same
    /// order ID.
    pub idempotency_key: Option<String>,
}

/// Currency and channel used for every payment the orchestrator opens.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentDefaults {
    pub currency: String,
    pub channel: PaymentChannel,
}

impl Default for PaymentDefaults {
    fn default() -> Self {
        Self {
            currency: "CNY".to_string(),
            channel: PaymentChannel::default(),
        }
    }
}

/// Result of a `pay_order` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReceipt {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    /// True when an in-flight payment was picked up instead of opening a new one.
    pub reused: bool,
}

/// Coordinates the order and payment aggregates.
///
/// The two aggregates live in separate repositories and are never written in one
/// transaction. Consistency comes from explicit status checks before every write and
/// from the repositories' version checks, which turn a lost race into an
/// `OptimisticLockConflict` instead of a lost update.
pub struct OrderOrchestrator {
    orders: OrderService,
    payments: PaymentService,
    products: ProductValidatorBox,
    defaults: PaymentDefaults,
}

impl OrderOrchestrator {
    pub fn new(
        order_repo: OrderRepositoryBox,
        payment_repo: PaymentRepositoryBox,
        products: ProductValidatorBox,
        gateway: PaymentGatewayBox,
        defaults: PaymentDefaults,
    ) -> Self {
        Self {
            orders: OrderService::new(order_repo),
            payments: PaymentService::new(payment_repo, gateway),
            products,
            defaults,
        }
    }

    /// Validates every line against the catalog and persists a new order.
    ///
    /// Lines are re-priced from the catalog; the quoted price is only compared. With an
    /// idempotency key, a replayed or concurrently duplicated request returns the ID of
    /// the order that was stored first.
    #[tracing::instrument(skip(self, ctx, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(&self, ctx: &RequestContext, request: NewOrder) -> Result<OrderId> {
        if request.customer_id.trim().is_empty() {
            return Err(OrderError::ValidationError(
                "Customer ID must not be empty".to_string(),
            ));
        }
        if request.lines.is_empty() {
            return Err(OrderError::ValidationError(
                "Order must contain at least one line item".to_string(),
            ));
        }
        for line in &request.lines {
            check_line(line)?;
        }

        let order_id = match &request.idempotency_key {
            Some(key) => {
                let id = OrderId::from_idempotency_key(&request.customer_id, key);
                match self.orders.get_order(ctx, &id).await {
                    Ok(existing) => {
                        tracing::info!(order_id = %existing.id, "Replayed order creation");
                        return Ok(existing.id);
                    }
                    Err(OrderError::OrderNotFound(_)) => id,
                    Err(err) => return Err(err),
                }
            }
            None => OrderId::generate(),
        };

        let mut items = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            items.push(self.price_line(ctx, line).await?);
        }

        let mut order = Order::new(order_id, request.customer_id, items)?;
        match self.orders.create_order(ctx, &mut order).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, total = %order.total_amount, "Order created");
                Ok(order.id)
            }
            Err(err) if err.is_conflict() && request.idempotency_key.is_some() => {
                let winner = self.orders.get_order(ctx, &order.id).await?;
                tracing::info!(order_id = %winner.id, "Concurrent keyed create already stored");
                Ok(winner.id)
            }
            Err(err) => Err(err),
        }
    }

    /// Moves an order into payment and charges it.
    ///
    /// Retrying is safe: an order that is already `pending` picks up its in-flight
    /// payment, and a payment that is awaiting gateway confirmation is not charged again.
    /// The order stays `pending`; see [`OrderOrchestrator::confirm_payment`].
    #[tracing::instrument(skip(self, ctx))]
    pub async fn pay_order(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<PaymentReceipt> {
        let mut order = self.orders.get_order(ctx, order_id).await?;
        if !matches!(order.status, OrderStatus::Created | OrderStatus::Pending) {
            return Err(OrderError::InvalidOrderState {
                order_id: order.id.to_string(),
                status: order.status,
                operation: "pay",
            });
        }

        let (payment, reused) = self.active_payment(ctx, &order).await?;

        if order.status == OrderStatus::Created {
            order.mark_as_pending_payment()?;
            self.orders.update_order(ctx, &mut order).await?;
        }

        let payment = if payment.status == PaymentStatus::Created {
            self.payments.charge(ctx, &payment).await?
        } else {
            tracing::info!(payment_id = %payment.id, "Payment awaiting confirmation; not charged again");
            payment
        };

        Ok(PaymentReceipt {
            order_id: order.id,
            payment_id: payment.id,
            status: payment.status,
            reused,
        })
    }

    /// Marks a pending order paid once its payment is confirmed by the gateway.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn confirm_payment(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Order> {
        let mut order = self.orders.get_order(ctx, order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(OrderError::InvalidOrderState {
                order_id: order.id.to_string(),
                status: order.status,
                operation: "confirm payment",
            });
        }

        let mut payment = match self.payments.get_payment_by_order_id(ctx, order_id).await {
            Ok(payment) => payment,
            // Every attempt failed; report the latest one.
            Err(OrderError::PaymentNotFound(message)) => self
                .payments
                .payment_history(ctx, order_id)
                .await?
                .pop()
                .ok_or(OrderError::PaymentNotFound(message))?,
            Err(err) => return Err(err),
        };
        if payment.status.is_active() {
            payment = self.payments.reconcile(ctx, &payment).await?;
        }
        if payment.status != PaymentStatus::Completed {
            return Err(OrderError::InvalidPaymentState {
                payment_id: payment.id.to_string(),
                status: payment.status,
                operation: "confirm the order",
            });
        }

        order.mark_as_paid()?;
        self.orders.update_order(ctx, &mut order).await?;
        tracing::info!(payment_id = %payment.id, "Order paid");
        Ok(order)
    }

    /// Cancels an order that is still `created` or already `paid`. No refund is issued.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn cancel_order(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Order> {
        self.transition(ctx, order_id, Order::cancel).await
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn ship_order(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Order> {
        self.transition(ctx, order_id, Order::mark_as_shipped).await
    }

    #[tracing::instrument(skip(self, ctx))]
    pub async fn complete_order(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Order> {
        self.transition(ctx, order_id, Order::complete).await
    }

    /// Persists an order the caller already mutated, guarded by its `version`.
    #[tracing::instrument(skip(self, ctx, order), fields(order_id = %order.id, version = order.version))]
    pub async fn update_order(&self, ctx: &RequestContext, order: &mut Order) -> Result<()> {
        self.orders.update_order(ctx, order).await
    }

    /// Replaces the items of a `created` order, re-priced from the catalog.
    ///
    /// `expected_version` is the version the caller last read; if the order changed
    /// since, the write fails with `OptimisticLockConflict`.
    #[tracing::instrument(skip(self, ctx, lines))]
    pub async fn replace_items(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        expected_version: u64,
        lines: &[OrderLine],
    ) -> Result<Order> {
        for line in lines {
            check_line(line)?;
        }
        let mut order = self.orders.get_order(ctx, order_id).await?;
        order.version = expected_version;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            items.push(self.price_line(ctx, line).await?);
        }
        order.replace_items(items)?;
        self.orders.update_order(ctx, &mut order).await?;
        Ok(order)
    }

    pub async fn get_order(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Order> {
        self.orders.get_order(ctx, order_id).await
    }

    /// Most recent payment of the order that did not fail.
    pub async fn get_payment(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Payment> {
        self.payments.get_payment_by_order_id(ctx, order_id).await
    }

    pub async fn payment_history(&self, ctx: &RequestContext, order_id: &OrderId) -> Result<Vec<Payment>> {
        self.payments.payment_history(ctx, order_id).await
    }

    async fn transition(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        apply: fn(&mut Order) -> Result<()>,
    ) -> Result<Order> {
        let mut order = self.orders.get_order(ctx, order_id).await?;
        apply(&mut order)?;
        self.orders.update_order(ctx, &mut order).await?;
        tracing::info!(status = %order.status, "Order updated");
        Ok(order)
    }

    /// Finds the payment to charge for `order`, opening a new attempt when none is active.
    async fn active_payment(&self, ctx: &RequestContext, order: &Order) -> Result<(Payment, bool)> {
        match self.payments.get_payment_by_order_id(ctx, &order.id).await {
            Ok(existing)
                if existing.status == PaymentStatus::Created
                    && existing.amount != order.total_amount =>
            {
                // Opened before the items changed; it must never be charged.
                tracing::warn!(
                    payment_id = %existing.id,
                    payment_amount = %existing.amount,
                    order_total = %order.total_amount,
                    "Discarding payment opened for a previous order total"
                );
                self.payments
                    .process_payment_result(ctx, &existing.id, "", false)
                    .await?;
                self.open_payment(ctx, order).await
            }
            Ok(existing) => Ok((reusable(order, existing)?, true)),
            Err(OrderError::PaymentNotFound(_)) => self.open_payment(ctx, order).await,
            Err(err) => Err(err),
        }
    }

    async fn open_payment(&self, ctx: &RequestContext, order: &Order) -> Result<(Payment, bool)> {
        let created = self
            .payments
            .create_payment(
                ctx,
                &order.id,
                order.total_amount,
                &self.defaults.currency,
                self.defaults.channel,
            )
            .await;

        match created {
            Ok(payment) => Ok((payment, false)),
            Err(
                err @ (OrderError::DuplicateActivePayment { .. }
                | OrderError::OptimisticLockConflict { .. }),
            ) => {
                tracing::debug!(error = %err, "Lost the race to open a payment; reusing the winner");
                match self.payments.get_payment_by_order_id(ctx, &order.id).await {
                    Ok(winner) => Ok((reusable(order, winner)?, true)),
                    Err(OrderError::PaymentNotFound(_)) => Err(err),
                    Err(other) => Err(other),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn price_line(&self, ctx: &RequestContext, line: &OrderLine) -> Result<LineItem> {
        let query = ProductQuery {
            product_id: line.product_id.clone(),
            name: String::new(),
            price: line.unit_price,
            quantity: line.quantity,
        };
        let verdict = ctx
            .run("validate product", self.products.validate_product(&query))
            .await?;

        let Some(product) = verdict.product else {
            return Err(OrderError::ProductInvalid {
                product_id: line.product_id.clone(),
                message: verdict.message,
            });
        };
        if product.status != ProductStatus::Valid {
            return Err(OrderError::ProductUnavailable {
                product_id: line.product_id.clone(),
                status: product.status,
            });
        }
        if !verdict.is_valid {
            return Err(OrderError::ProductInvalid {
                product_id: line.product_id.clone(),
                message: verdict.message,
            });
        }

        if product.price != line.unit_price {
            tracing::info!(
                product_id = %line.product_id,
                quoted = %line.unit_price,
                catalog = %product.price,
                "Quoted price differs from catalog; using catalog price"
            );
        }
        LineItem::new(line.product_id.clone(), line.quantity, product.price)
    }
}

fn check_line(line: &OrderLine) -> Result<()> {
    if line.product_id.trim().is_empty() {
        return Err(OrderError::ValidationError(
            "Line item product ID must not be empty".to_string(),
        ));
    }
    if line.quantity <= 0 {
        return Err(OrderError::ValidationError(format!(
            "Quantity for product {} must be positive",
            line.product_id
        )));
    }
    if line.unit_price.is_negative() {
        return Err(OrderError::ValidationError(format!(
            "Unit price for product {} must not be negative",
            line.product_id
        )));
    }
    Ok(())
}

fn reusable(order: &Order, payment: Payment) -> Result<Payment> {
    match payment.status {
        PaymentStatus::Completed => Err(OrderError::PaymentAlreadySettled {
            order_id: order.id.to_string(),
            payment_id: payment.id.to_string(),
        }),
        status if status.is_active() => Ok(payment),
        status => Err(OrderError::InvalidPaymentState {
            payment_id: payment.id.to_string(),
            status,
            operation: "reuse it for a new charge",
        }),
    }
}
