use crate::error::{TrustError, TrustResult};
use crate::model::{ScoreWithHistory, SuspiciousCustomer, TrustTier};
use crate::storage::{HistoryLedger, ScoreStore};
use std::sync::Arc;
use tracing::debug;

/// History entries returned with a score read.
pub const SCORE_HISTORY_LIMIT: u32 = 10;
/// Return entries attached to each suspicious-view row.
pub const RECENT_RETURNS_LIMIT: u32 = 5;

/// Read side of the trust engine: the score endpoint payload and the
/// suspicious-customer watchlist.
pub struct TrustView {
    scores: Arc<dyn ScoreStore>,
    ledger: Arc<dyn HistoryLedger>,
}

impl TrustView {
    pub fn new(scores: Arc<dyn ScoreStore>, ledger: Arc<dyn HistoryLedger>) -> Self {
        Self { scores, ledger }
    }

    /// Score plus recent history; creates the default record on first access.
    pub async fn score_with_history(&self, phone: &str) -> TrustResult<ScoreWithHistory> {
        let score = self.scores.get_or_create_score(phone, None).await?;
        let history = self.ledger.list_recent(phone, SCORE_HISTORY_LIMIT).await?;
        Ok(ScoreWithHistory { score, history })
    }

    /// Customers at `min_tier` or worse, worst first, each enriched with
    /// their most recent returns.
    ///
    /// Unrecognized filter values are rejected instead of silently widening
    /// to the most inclusive set.
    pub async fn suspicious(&self, min_tier: &str) -> TrustResult<Vec<SuspiciousCustomer>> {
        let tier = TrustTier::parse(min_tier)
            .ok_or_else(|| TrustError::InvalidArgument(format!("unknown tier filter: {min_tier}")))?;
        if tier == TrustTier::Good {
            return Err(TrustError::InvalidArgument(
                "tier filter must be one of warning, watch, blacklisted".to_string(),
            ));
        }

        let scores = self.scores.list_suspicious(tier).await?;
        debug!(min_tier = %tier, count = scores.len(), "loaded suspicious customers");

        // Per-row fan-out is bounded by RECENT_RETURNS_LIMIT and fine at the
        // expected customer-base scale; batch it before growing past that.
        let mut result = Vec::with_capacity(scores.len());
        for score in scores {
            let recent_returns = self
                .ledger
                .list_recent_returns(&score.phone, RECENT_RETURNS_LIMIT)
                .await?;
            result.push(SuspiciousCustomer {
                score,
                recent_returns,
            });
        }
        Ok(result)
    }
}
