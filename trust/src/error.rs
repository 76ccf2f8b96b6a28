use crate::model::{ModelId, OrderStatus};
use thiserror::Error;

/// Error taxonomy for the trust engine.
///
/// Validation and authorization failures are returned before any state is
/// mutated. `StoreUnavailable` is the only retryable variant; `Conflict`
/// marks a duplicate idempotency key and is absorbed by the engine as a
/// success-no-op rather than surfaced to callers.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("no verified identity supplied")]
    Unauthorized,

    #[error("caller does not own order {0}")]
    Forbidden(ModelId),

    #[error("order {0} not found")]
    OrderNotFound(ModelId),

    #[error("order {order_id} is {status}, only pending orders can be cancelled")]
    InvalidState {
        order_id: ModelId,
        status: OrderStatus,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("duplicate application of a score event")]
    Conflict,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),
}

pub type TrustResult<T> = Result<T, TrustError>;

impl From<sqlx::Error> for TrustError {
    fn from(e: sqlx::Error) -> Self {
        let unique = matches!(
            &e,
            sqlx::Error::Database(db) if db.is_unique_violation()
        );
        if unique {
            TrustError::Conflict
        } else {
            TrustError::StoreUnavailable(e)
        }
    }
}

impl TrustError {
    /// Only infrastructure failures are worth retrying; logical failures
    /// come back identical on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, TrustError::StoreUnavailable(_))
    }
}
