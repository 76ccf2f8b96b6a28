use crate::model::TrustEventKind;
use std::time::Duration;

/// Score impact of a single applied event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventEffect {
    pub delta: i64,
    pub orders_inc: i64,
    pub fulfilled_inc: i64,
    pub returns_inc: i64,
    pub spend_inc: f64,
}

/// Scoring policy: per-event deltas, retry discipline and optional
/// implicit-fulfillment window. Kept as data so deployments can tune it
/// without touching the engine.
#[derive(Debug, Clone)]
pub struct ScorePolicy {
    pub fulfilled_delta: i64,
    pub returned_delta: i64,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    /// When set, pending orders older than this many days are eligible for
    /// bulk settlement as implicitly successful. Off by default; see
    /// `settlement::OrderSettlement`.
    pub implicit_fulfillment_after_days: Option<u32>,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            fulfilled_delta: 5,
            returned_delta: -15,
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(50),
            implicit_fulfillment_after_days: None,
        }
    }
}

impl ScorePolicy {
    /// A placed order only counts; fulfillment rewards and feeds the spend
    /// total; a return/cancellation penalizes.
    pub fn effect_of(&self, kind: TrustEventKind, amount: Option<f64>) -> EventEffect {
        match kind {
            TrustEventKind::Placed => EventEffect {
                delta: 0,
                orders_inc: 1,
                fulfilled_inc: 0,
                returns_inc: 0,
                spend_inc: 0.0,
            },
            TrustEventKind::Fulfilled => EventEffect {
                delta: self.fulfilled_delta,
                orders_inc: 0,
                fulfilled_inc: 1,
                returns_inc: 0,
                spend_inc: amount.unwrap_or(0.0),
            },
            TrustEventKind::Returned => EventEffect {
                delta: self.returned_delta,
                orders_inc: 0,
                fulfilled_inc: 0,
                returns_inc: 1,
                spend_inc: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placed_orders_carry_no_score_delta() {
        let policy = ScorePolicy::default();
        let effect = policy.effect_of(TrustEventKind::Placed, None);
        assert_eq!(effect.delta, 0);
        assert_eq!(effect.orders_inc, 1);
        assert_eq!(effect.spend_inc, 0.0);
    }

    #[test]
    fn only_fulfilled_orders_feed_the_spend_total() {
        let policy = ScorePolicy::default();
        let fulfilled = policy.effect_of(TrustEventKind::Fulfilled, Some(120.0));
        assert_eq!(fulfilled.spend_inc, 120.0);
        assert!(fulfilled.delta > 0);

        let returned = policy.effect_of(TrustEventKind::Returned, Some(120.0));
        assert_eq!(returned.spend_inc, 0.0);
        assert!(returned.delta < 0);
    }
}
