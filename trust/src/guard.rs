use crate::engine::ScoreEngine;
use crate::error::{TrustError, TrustResult};
use crate::model::{Identity, ModelId, Order, OrderStatus, TrustEventKind};
use crate::storage::OrderStore;
use std::sync::Arc;
use tracing::{error, info};

/// Gate in front of caller-triggered order cancellation.
///
/// PENDING -> CANCELLED is the only transition a customer may trigger; every
/// other state is terminal or owned by the fulfillment pipeline.
pub struct CancellationGuard {
    orders: Arc<dyn OrderStore>,
    engine: Arc<ScoreEngine>,
}

impl CancellationGuard {
    pub fn new(orders: Arc<dyn OrderStore>, engine: Arc<ScoreEngine>) -> Self {
        Self { orders, engine }
    }

    pub async fn cancel(&self, order_id: ModelId, identity: &Identity) -> TrustResult<Order> {
        if identity.is_anonymous() {
            return Err(TrustError::Unauthorized);
        }

        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(TrustError::OrderNotFound(order_id))?;

        if !identity.owns(&order) {
            return Err(TrustError::Forbidden(order_id));
        }
        if order.status != OrderStatus::Pending {
            return Err(TrustError::InvalidState {
                order_id,
                status: order.status,
            });
        }

        // The store transition is conditional on PENDING, so a concurrent
        // cancel or fulfillment makes this fail with InvalidState instead of
        // double-transitioning.
        let cancelled = self.orders.mark_cancelled(order_id).await?;
        info!(order_id, phone = %cancelled.guest_phone, "order cancelled");

        // Scoring is applied within the engine's bounded retry window; the
        // cancellation itself does not roll back if scoring still fails.
        if let Err(e) = self
            .engine
            .handle_event(
                &cancelled.guest_phone,
                TrustEventKind::Returned,
                order_id,
                cancelled.customer_name.as_deref(),
                None,
            )
            .await
        {
            error!(
                order_id,
                phone = %cancelled.guest_phone,
                error = %e,
                "failed to apply cancellation to trust score"
            );
        }

        Ok(cancelled)
    }
}
