use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ModelId = i64;

/// Discrete risk tier for a customer, derived from the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustTier {
    Good,
    Warning,
    Watch,
    Blacklisted,
}

impl TrustTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Good => "GOOD",
            TrustTier::Warning => "WARNING",
            TrustTier::Watch => "WATCH",
            TrustTier::Blacklisted => "BLACKLISTED",
        }
    }

    pub fn parse(value: &str) -> Option<TrustTier> {
        match value.to_ascii_uppercase().as_str() {
            "GOOD" => Some(TrustTier::Good),
            "WARNING" => Some(TrustTier::Warning),
            "WATCH" => Some(TrustTier::Watch),
            "BLACKLISTED" => Some(TrustTier::Blacklisted),
            _ => None,
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-lifecycle events that mutate a customer's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustEventKind {
    #[serde(rename = "ORDER_PLACED")]
    Placed,
    #[serde(rename = "ORDER_FULFILLED")]
    Fulfilled,
    #[serde(rename = "ORDER_CANCELLED_OR_RETURNED")]
    Returned,
}

impl TrustEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustEventKind::Placed => "ORDER_PLACED",
            TrustEventKind::Fulfilled => "ORDER_FULFILLED",
            TrustEventKind::Returned => "ORDER_CANCELLED_OR_RETURNED",
        }
    }

    pub fn parse(value: &str) -> Option<TrustEventKind> {
        match value {
            "ORDER_PLACED" => Some(TrustEventKind::Placed),
            "ORDER_FULFILLED" => Some(TrustEventKind::Fulfilled),
            "ORDER_CANCELLED_OR_RETURNED" => Some(TrustEventKind::Returned),
            _ => None,
        }
    }
}

impl fmt::Display for TrustEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-customer reputation record, keyed by phone number.
///
/// `status` is recomputed from `trust_score` on every mutation; the persisted
/// column is a cache and is never trusted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerScore {
    pub phone: String,
    pub name: Option<String>,
    pub trust_score: i64,
    pub total_orders: i64,
    pub total_returns: i64,
    pub successful_orders: i64,
    pub total_spent: f64,
    pub status: TrustTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable entry of the append-only score audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreHistory {
    pub id: ModelId,
    pub customer_phone: String,
    pub order_id: ModelId,
    pub event_kind: TrustEventKind,
    pub delta: i64,
    pub resulting_score: i64,
    pub resulting_tier: TrustTier,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Fulfilled => "FULFILLED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value {
            "PENDING" => Some(OrderStatus::Pending),
            "FULFILLED" => Some(OrderStatus::Fulfilled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: ModelId,
    pub order_number: String,
    pub user_id: Option<i64>,
    pub guest_email: Option<String>,
    pub guest_phone: String,
    pub customer_name: Option<String>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Option<i64>,
    pub guest_email: Option<String>,
    pub guest_phone: String,
    pub customer_name: Option<String>,
    pub total_amount: f64,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), String> {
        if self.order_number.trim().is_empty() {
            return Err("order_number must not be empty".to_string());
        }
        if self.guest_phone.trim().is_empty() {
            return Err("guest_phone must not be empty".to_string());
        }
        if !self.total_amount.is_finite() || self.total_amount < 0.0 {
            return Err("total_amount must be a non-negative number".to_string());
        }
        Ok(())
    }
}

/// Verified principal supplied by the session collaborator.
///
/// The core never re-validates credentials; an upstream layer has already
/// authenticated whatever ends up in here.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub user_id: Option<i64>,
    pub email: Option<String>,
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none() && self.email.is_none()
    }

    /// Ownership is an OR over registered user id and guest email.
    pub fn owns(&self, order: &Order) -> bool {
        let user_match = match (self.user_id, order.user_id) {
            (Some(caller), Some(owner)) => caller == owner,
            _ => false,
        };
        let email_match = match (&self.email, &order.guest_email) {
            (Some(caller), Some(owner)) => caller.eq_ignore_ascii_case(owner),
            _ => false,
        };
        user_match || email_match
    }
}

/// Payload of the score read endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWithHistory {
    pub score: CustomerScore,
    pub history: Vec<ScoreHistory>,
}

/// One row of the suspicious-customer view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousCustomer {
    #[serde(flatten)]
    pub score: CustomerScore,
    pub recent_returns: Vec<ScoreHistory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trips_through_strings() {
        for tier in [
            TrustTier::Good,
            TrustTier::Warning,
            TrustTier::Watch,
            TrustTier::Blacklisted,
        ] {
            assert_eq!(TrustTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(TrustTier::parse("warning"), Some(TrustTier::Warning));
        assert_eq!(TrustTier::parse("nonsense"), None);
    }

    #[test]
    fn event_kind_round_trips_through_strings() {
        for kind in [
            TrustEventKind::Placed,
            TrustEventKind::Fulfilled,
            TrustEventKind::Returned,
        ] {
            assert_eq!(TrustEventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn ownership_is_an_or_of_user_id_and_email() {
        let order = Order {
            id: 1,
            order_number: "A-1".to_string(),
            user_id: Some(7),
            guest_email: Some("guest@example.com".to_string()),
            guest_phone: "0551234567".to_string(),
            customer_name: None,
            total_amount: 10.0,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };

        let by_id = Identity {
            user_id: Some(7),
            email: None,
        };
        let by_email = Identity {
            user_id: None,
            email: Some("GUEST@example.com".to_string()),
        };
        let stranger = Identity {
            user_id: Some(8),
            email: Some("other@example.com".to_string()),
        };

        assert!(by_id.owns(&order));
        assert!(by_email.owns(&order));
        assert!(!stranger.owns(&order));
        assert!(Identity::default().is_anonymous());
    }

    #[test]
    fn new_order_validation_rejects_bad_input() {
        let mut order = NewOrder {
            order_number: "A-1".to_string(),
            user_id: None,
            guest_email: None,
            guest_phone: "0551234567".to_string(),
            customer_name: None,
            total_amount: 25.0,
        };
        assert!(order.validate().is_ok());

        order.guest_phone = " ".to_string();
        assert!(order.validate().is_err());

        order.guest_phone = "0551234567".to_string();
        order.total_amount = f64::NAN;
        assert!(order.validate().is_err());
    }
}
