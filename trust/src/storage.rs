use crate::error::TrustResult;
use crate::model::{
    CustomerScore, ModelId, NewOrder, Order, ScoreHistory, TrustEventKind, TrustTier,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A fully computed score mutation, ready to be applied atomically.
///
/// The engine turns an event into one of these; the store applies it in a
/// single transaction (score row mutation plus ledger append) so the two can
/// never diverge.
#[derive(Debug, Clone)]
pub struct ScoreChange {
    pub phone: String,
    pub name: Option<String>,
    pub order_id: ModelId,
    pub kind: TrustEventKind,
    pub delta: i64,
    pub orders_inc: i64,
    pub fulfilled_inc: i64,
    pub returns_inc: i64,
    pub spend_inc: f64,
}

#[derive(Debug, Clone)]
pub enum EventOutcome {
    Applied(CustomerScore),
    /// The idempotency key `(order_id, kind)` was already recorded; the
    /// wrapped record is the current, unchanged state.
    AlreadyApplied(CustomerScore),
}

impl EventOutcome {
    pub fn into_score(self) -> CustomerScore {
        match self {
            EventOutcome::Applied(score) | EventOutcome::AlreadyApplied(score) => score,
        }
    }
}

/// Durable per-customer trust state; the single source of truth.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn get_score(&self, phone: &str) -> TrustResult<Option<CustomerScore>>;

    /// Creates the default record (score 100, tier GOOD) when absent.
    /// Atomic with respect to concurrent creators of the same phone.
    async fn get_or_create_score(
        &self,
        phone: &str,
        name: Option<&str>,
    ) -> TrustResult<CustomerScore>;

    /// Read-modify-write under the store's transaction discipline: clamps
    /// the score into bounds, bumps counters, recomputes the tier and
    /// appends the ledger entry, all in one transaction.
    async fn apply_event(&self, change: &ScoreChange) -> TrustResult<EventOutcome>;

    /// All customers at `min_tier` or worse, worst score first. Filtering is
    /// done on the score itself, never on the cached status column.
    async fn list_suspicious(&self, min_tier: TrustTier) -> TrustResult<Vec<CustomerScore>>;
}

/// Append-only audit trail of score-changing events.
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// Newest first; finite; restartable (no cursor state between calls).
    async fn list_recent(&self, phone: &str, limit: u32) -> TrustResult<Vec<ScoreHistory>>;

    /// Newest first, restricted to return/cancellation events.
    async fn list_recent_returns(&self, phone: &str, limit: u32)
    -> TrustResult<Vec<ScoreHistory>>;

    /// Idempotency probe for `(order_id, kind)`.
    async fn was_applied(&self, order_id: ModelId, kind: TrustEventKind) -> TrustResult<bool>;
}

/// Order records the guard and intake paths read and transition.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn save_order(&self, order: &NewOrder) -> TrustResult<Order>;

    async fn get_order(&self, id: ModelId) -> TrustResult<Option<Order>>;

    /// Conditional PENDING -> CANCELLED transition; fails with
    /// `InvalidState` when the order is in any other state, `OrderNotFound`
    /// when it does not exist.
    async fn mark_cancelled(&self, id: ModelId) -> TrustResult<Order>;

    /// Conditional PENDING -> FULFILLED transition, same failure modes.
    async fn mark_fulfilled(&self, id: ModelId) -> TrustResult<Order>;

    async fn list_pending_older_than(&self, cutoff: DateTime<Utc>) -> TrustResult<Vec<Order>>;
}
