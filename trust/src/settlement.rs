use crate::engine::ScoreEngine;
use crate::error::{TrustError, TrustResult};
use crate::model::TrustEventKind;
use crate::storage::OrderStore;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Serialize)]
pub struct SettlementReport {
    pub examined: usize,
    pub fulfilled: usize,
}

/// Bulk settlement of aged pending orders as implicitly successful.
///
/// Whether an order that was never cancelled counts as fulfilled after some
/// retention period is policy, not a built-in rule: the operation does
/// nothing unless `ScorePolicy::implicit_fulfillment_after_days` is set, and
/// it only ever runs on demand from the admin surface. There is no
/// background scheduler in this service.
pub struct OrderSettlement {
    orders: Arc<dyn OrderStore>,
    engine: Arc<ScoreEngine>,
}

impl OrderSettlement {
    pub fn new(orders: Arc<dyn OrderStore>, engine: Arc<ScoreEngine>) -> Self {
        Self { orders, engine }
    }

    pub async fn settle_aged(&self, now: DateTime<Utc>) -> TrustResult<SettlementReport> {
        let Some(days) = self.engine.policy().implicit_fulfillment_after_days else {
            debug!("implicit fulfillment disabled, nothing to settle");
            return Ok(SettlementReport::default());
        };

        let cutoff = now - Duration::days(i64::from(days));
        let aged = self.orders.list_pending_older_than(cutoff).await?;
        let mut report = SettlementReport {
            examined: aged.len(),
            fulfilled: 0,
        };

        for order in aged {
            let fulfilled = match self.orders.mark_fulfilled(order.id).await {
                Ok(order) => order,
                // Raced a concurrent cancel or fulfillment; skip it.
                Err(TrustError::InvalidState { .. }) => continue,
                Err(e) => return Err(e),
            };
            self.engine
                .handle_event(
                    &fulfilled.guest_phone,
                    TrustEventKind::Fulfilled,
                    fulfilled.id,
                    fulfilled.customer_name.as_deref(),
                    Some(fulfilled.total_amount),
                )
                .await?;
            report.fulfilled += 1;
        }

        info!(
            examined = report.examined,
            fulfilled = report.fulfilled,
            "settled aged pending orders"
        );
        Ok(report)
    }
}
