use crate::error::{TrustError, TrustResult};
use crate::model::{CustomerScore, ModelId, TrustEventKind};
use crate::policy::ScorePolicy;
use crate::storage::{EventOutcome, HistoryLedger, ScoreChange, ScoreStore};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Applies order-lifecycle events to customer trust records.
///
/// Stores are injected as capability interfaces; the engine itself is
/// stateless and safe to share across request handlers.
pub struct ScoreEngine {
    scores: Arc<dyn ScoreStore>,
    ledger: Arc<dyn HistoryLedger>,
    policy: ScorePolicy,
}

impl ScoreEngine {
    pub fn new(
        scores: Arc<dyn ScoreStore>,
        ledger: Arc<dyn HistoryLedger>,
        policy: ScorePolicy,
    ) -> Self {
        Self {
            scores,
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> &ScorePolicy {
        &self.policy
    }

    /// Apply one business event to the customer owning `phone`.
    ///
    /// Duplicate `(order_id, kind)` applications are a success-no-op: the
    /// current record comes back unchanged. Transient store failures are
    /// retried a bounded number of times; logical failures are not.
    pub async fn handle_event(
        &self,
        phone: &str,
        kind: TrustEventKind,
        order_id: ModelId,
        name: Option<&str>,
        amount: Option<f64>,
    ) -> TrustResult<CustomerScore> {
        if self.ledger.was_applied(order_id, kind).await? {
            debug!(phone, order_id, %kind, "event already applied, returning current score");
            return self.scores.get_or_create_score(phone, name).await;
        }

        let effect = self.policy.effect_of(kind, amount);
        let change = ScoreChange {
            phone: phone.to_string(),
            name: name.map(str::to_string),
            order_id,
            kind,
            delta: effect.delta,
            orders_inc: effect.orders_inc,
            fulfilled_inc: effect.fulfilled_inc,
            returns_inc: effect.returns_inc,
            spend_inc: effect.spend_inc,
        };

        let mut attempt = 0u32;
        loop {
            match self.scores.apply_event(&change).await {
                Ok(EventOutcome::Applied(score)) => {
                    info!(
                        phone,
                        order_id,
                        %kind,
                        trust_score = score.trust_score,
                        status = %score.status,
                        "applied score event"
                    );
                    return Ok(score);
                }
                Ok(EventOutcome::AlreadyApplied(score)) => {
                    debug!(phone, order_id, %kind, "event raced a duplicate, no-op");
                    return Ok(score);
                }
                Err(TrustError::Conflict) => {
                    debug!(phone, order_id, %kind, "duplicate event detected by the store");
                    return self.scores.get_or_create_score(phone, name).await;
                }
                Err(e) if e.is_transient() && attempt < self.policy.retry_attempts => {
                    attempt += 1;
                    warn!(
                        phone,
                        order_id,
                        attempt,
                        error = %e,
                        "transient store failure, retrying score event"
                    );
                    sleep(self.policy.retry_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
