use super::order::{Order, OrderId};
use super::ports::OrderRepositoryBox;
use crate::context::RequestContext;
use crate::error::Result;
use chrono::Utc;

/// Validates order aggregates and hands them to the order repository.
///
/// The repository owns the version counter; after every successful write the new
/// version is copied back onto the caller's aggregate so it can be saved again.
pub struct OrderService {
    repo: OrderRepositoryBox,
}

impl OrderService {
    pub fn new(repo: OrderRepositoryBox) -> Self {
        Self { repo }
    }

    /// Persists a brand-new order.
    pub async fn create_order(&self, ctx: &RequestContext, order: &mut Order) -> Result<()> {
        order.validate()?;
        let now = Utc::now();
        order.created_at = now;
        order.updated_at = now;
        order.version = ctx.run("save new order", self.repo.save(order)).await?;
        Ok(())
    }

    pub async fn get_order(&self, ctx: &RequestContext, id: &OrderId) -> Result<Order> {
        ctx.run("find order", self.repo.find_by_id(id)).await
    }

    /// Persists a mutated order.
    ///
    /// A stale `order.version` fails with `OptimisticLockConflict`; the stored record is
    /// left as it was and the caller should reload before retrying.
    pub async fn update_order(&self, ctx: &RequestContext, order: &mut Order) -> Result<()> {
        order.validate_update()?;
        order.version = ctx.run("save order", self.repo.save(order)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::order::{LineItem, OrderStatus};
    use crate::error::OrderError;
    use crate::infrastructure::in_memory::InMemoryOrderRepository;

    fn service() -> (OrderService, InMemoryOrderRepository) {
        let repo = InMemoryOrderRepository::new();
        (OrderService::new(Box::new(repo.clone())), repo)
    }

    fn order() -> Order {
        let items = vec![
            LineItem::new("P1", 2, Money::from_minor(100)).unwrap(),
            LineItem::new("P2", 1, Money::from_minor(250)).unwrap(),
        ];
        Order::new(OrderId::generate(), "c-1", items).unwrap()
    }

    #[tokio::test]
    async fn test_create_then_update() {
        let (service, _) = service();
        let ctx = RequestContext::new();
        let mut order = order();

        service.create_order(&ctx, &mut order).await.unwrap();
        assert_eq!(order.version, 1);

        order.mark_as_pending_payment().unwrap();
        service.update_order(&ctx, &mut order).await.unwrap();
        assert_eq!(order.version, 2);

        let stored = service.get_order(&ctx, &order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.total_amount, Money::from_minor(450));
    }

    #[tokio::test]
    async fn test_invalid_order_is_not_persisted() {
        let (service, repo) = service();
        let ctx = RequestContext::new();
        let mut order = order();
        order.total_amount = Money::from_minor(1);

        let err = service.create_order(&ctx, &mut order).await.unwrap_err();
        assert!(matches!(err, OrderError::ValidationError(_)));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_stale_update_is_a_conflict() {
        let (service, _) = service();
        let ctx = RequestContext::new();
        let mut order = order();
        service.create_order(&ctx, &mut order).await.unwrap();

        let mut stale = order.clone();
        order.cancel().unwrap();
        service.update_order(&ctx, &mut order).await.unwrap();

        stale.mark_as_pending_payment().unwrap();
        let err = service.update_order(&ctx, &mut stale).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(stale.version, 1);

        let stored = service.get_order(&ctx, &order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let (service, _) = service();
        let err = service
            .get_order(&RequestContext::new(), &OrderId::new("nope"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
