use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use trust::classifier::{ScoreBounds, TierThresholds};
use trust::error::{TrustError, TrustResult};
use trust::model::{
    CustomerScore, ModelId, NewOrder, Order, OrderStatus, ScoreHistory, TrustEventKind, TrustTier,
};
use trust::storage::{EventOutcome, HistoryLedger, OrderStore, ScoreChange, ScoreStore};

const SCORE_COLUMNS: &str = "phone, name, trust_score, total_orders, total_returns, \
     successful_orders, total_spent, status, created_at, updated_at";
const HISTORY_COLUMNS: &str = "id, customer_phone, order_id, event_kind, delta, \
     resulting_score, resulting_tier, created_at";
const ORDER_COLUMNS: &str = "id, order_number, user_id, guest_email, guest_phone, \
     customer_name, total_amount, status, created_at";

/// SQLite-backed implementation of the trust storage capabilities.
///
/// One struct implements all three traits so the score row mutation and the
/// ledger append share a pool and commit inside a single transaction.
pub struct SqliteTrustStorage {
    pub pool: SqlitePool,
    thresholds: TierThresholds,
    bounds: ScoreBounds,
}

impl SqliteTrustStorage {
    pub async fn new(database_url: &str) -> TrustResult<Self> {
        Self::with_config(database_url, TierThresholds::default(), ScoreBounds::default()).await
    }

    pub async fn with_config(
        database_url: &str,
        thresholds: TierThresholds,
        bounds: ScoreBounds,
    ) -> TrustResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool,
            thresholds,
            bounds,
        })
    }

    pub async fn initialize_schema(&self) -> TrustResult<()> {
        let init_sql = include_str!("../resources/init.sql");
        sqlx::raw_sql(init_sql).execute(&self.pool).await?;
        debug!("trust schema initialized");
        Ok(())
    }

    fn score_from_row(&self, row: &SqliteRow) -> TrustResult<CustomerScore> {
        let trust_score: i64 = row.try_get("trust_score")?;
        Ok(CustomerScore {
            phone: row.try_get("phone")?,
            name: row.try_get("name")?,
            trust_score,
            total_orders: row.try_get("total_orders")?,
            total_returns: row.try_get("total_returns")?,
            successful_orders: row.try_get("successful_orders")?,
            total_spent: row.try_get("total_spent")?,
            // The stored status column is a cache; the classifier is
            // authoritative.
            status: self.thresholds.classify(trust_score),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn history_from_row(row: &SqliteRow) -> TrustResult<ScoreHistory> {
        let kind: String = row.try_get("event_kind")?;
        let tier: String = row.try_get("resulting_tier")?;
        Ok(ScoreHistory {
            id: row.try_get("id")?,
            customer_phone: row.try_get("customer_phone")?,
            order_id: row.try_get("order_id")?,
            event_kind: TrustEventKind::parse(&kind).ok_or_else(|| {
                TrustError::InvalidArgument(format!("unknown event kind in ledger: {kind}"))
            })?,
            delta: row.try_get("delta")?,
            resulting_score: row.try_get("resulting_score")?,
            resulting_tier: TrustTier::parse(&tier).ok_or_else(|| {
                TrustError::InvalidArgument(format!("unknown tier in ledger: {tier}"))
            })?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn order_from_row(row: &SqliteRow) -> TrustResult<Order> {
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: row.try_get("id")?,
            order_number: row.try_get("order_number")?,
            user_id: row.try_get("user_id")?,
            guest_email: row.try_get("guest_email")?,
            guest_phone: row.try_get("guest_phone")?,
            customer_name: row.try_get("customer_name")?,
            total_amount: row.try_get("total_amount")?,
            status: OrderStatus::parse(&status).ok_or_else(|| {
                TrustError::InvalidArgument(format!("unknown order status: {status}"))
            })?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Insert the default record unless the phone is already known. The
    /// unique primary key makes this safe against concurrent creators.
    async fn ensure_score_row<'e, E>(
        &self,
        executor: E,
        phone: &str,
        name: Option<&str>,
        now: DateTime<Utc>,
    ) -> TrustResult<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            "INSERT INTO customer_scores (phone, name, trust_score, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(phone)
        .bind(name)
        .bind(self.bounds.max)
        .bind(self.thresholds.classify(self.bounds.max).as_str())
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for SqliteTrustStorage {
    async fn get_score(&self, phone: &str) -> TrustResult<Option<CustomerScore>> {
        let row = sqlx::query(&format!(
            "SELECT {SCORE_COLUMNS} FROM customer_scores WHERE phone = ?"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| self.score_from_row(&row)).transpose()
    }

    async fn get_or_create_score(
        &self,
        phone: &str,
        name: Option<&str>,
    ) -> TrustResult<CustomerScore> {
        self.ensure_score_row(&self.pool, phone, name, Utc::now())
            .await?;
        if let Some(name) = name {
            // Display label is last-write-wins.
            sqlx::query("UPDATE customer_scores SET name = ? WHERE phone = ?")
                .bind(name)
                .bind(phone)
                .execute(&self.pool)
                .await?;
        }
        let row = sqlx::query(&format!(
            "SELECT {SCORE_COLUMNS} FROM customer_scores WHERE phone = ?"
        ))
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;
        self.score_from_row(&row)
    }

    async fn apply_event(&self, change: &ScoreChange) -> TrustResult<EventOutcome> {
        debug!(
            phone = %change.phone,
            order_id = change.order_id,
            kind = %change.kind,
            delta = change.delta,
            "applying score event"
        );
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // The first statement is a write so the transaction takes SQLite's
        // write lock up front and honors the busy timeout under contention.
        self.ensure_score_row(&mut *tx, &change.phone, change.name.as_deref(), now)
            .await?;

        let row = sqlx::query(&format!(
            "SELECT {SCORE_COLUMNS} FROM customer_scores WHERE phone = ?"
        ))
        .bind(&change.phone)
        .fetch_one(&mut *tx)
        .await?;
        let current = self.score_from_row(&row)?;

        let new_score = self.bounds.clamp(current.trust_score + change.delta);
        let new_tier = self.thresholds.classify(new_score);

        let appended = sqlx::query(
            "INSERT INTO score_history \
             (customer_phone, order_id, event_kind, delta, resulting_score, resulting_tier, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&change.phone)
        .bind(change.order_id)
        .bind(change.kind.as_str())
        .bind(change.delta)
        .bind(new_score)
        .bind(new_tier.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(e) = appended {
            return match TrustError::from(e) {
                TrustError::Conflict => {
                    // Duplicate idempotency key: roll everything back and
                    // report the current state untouched.
                    tx.rollback().await.ok();
                    debug!(
                        phone = %change.phone,
                        order_id = change.order_id,
                        kind = %change.kind,
                        "event already applied"
                    );
                    Ok(EventOutcome::AlreadyApplied(current))
                }
                other => Err(other),
            };
        }

        sqlx::query(
            "UPDATE customer_scores SET \
                 trust_score = ?, \
                 status = ?, \
                 total_orders = total_orders + ?, \
                 successful_orders = successful_orders + ?, \
                 total_returns = total_returns + ?, \
                 total_spent = total_spent + ?, \
                 updated_at = ? \
             WHERE phone = ?",
        )
        .bind(new_score)
        .bind(new_tier.as_str())
        .bind(change.orders_inc)
        .bind(change.fulfilled_inc)
        .bind(change.returns_inc)
        .bind(change.spend_inc)
        .bind(now)
        .bind(&change.phone)
        .execute(&mut *tx)
        .await?;

        if let Some(name) = change.name.as_deref() {
            sqlx::query("UPDATE customer_scores SET name = ? WHERE phone = ?")
                .bind(name)
                .bind(&change.phone)
                .execute(&mut *tx)
                .await?;
        }

        let row = sqlx::query(&format!(
            "SELECT {SCORE_COLUMNS} FROM customer_scores WHERE phone = ?"
        ))
        .bind(&change.phone)
        .fetch_one(&mut *tx)
        .await?;
        let updated = self.score_from_row(&row)?;

        tx.commit().await?;
        info!(
            phone = %change.phone,
            order_id = change.order_id,
            kind = %change.kind,
            trust_score = updated.trust_score,
            status = %updated.status,
            "score event committed"
        );
        Ok(EventOutcome::Applied(updated))
    }

    async fn list_suspicious(&self, min_tier: TrustTier) -> TrustResult<Vec<CustomerScore>> {
        // Filter on the score itself, not the cached status column, so a
        // threshold change takes effect without a data migration.
        let bound = self.thresholds.upper_bound(min_tier);
        let rows = sqlx::query(&format!(
            "SELECT {SCORE_COLUMNS} FROM customer_scores \
             WHERE trust_score < ? \
             ORDER BY trust_score ASC, phone ASC"
        ))
        .bind(bound)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| self.score_from_row(row)).collect()
    }
}

#[async_trait]
impl HistoryLedger for SqliteTrustStorage {
    async fn list_recent(&self, phone: &str, limit: u32) -> TrustResult<Vec<ScoreHistory>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM score_history \
             WHERE customer_phone = ? \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?"
        ))
        .bind(phone)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::history_from_row).collect()
    }

    async fn list_recent_returns(
        &self,
        phone: &str,
        limit: u32,
    ) -> TrustResult<Vec<ScoreHistory>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM score_history \
             WHERE customer_phone = ? AND event_kind = ? \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?"
        ))
        .bind(phone)
        .bind(TrustEventKind::Returned.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::history_from_row).collect()
    }

    async fn was_applied(&self, order_id: ModelId, kind: TrustEventKind) -> TrustResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM score_history WHERE order_id = ? AND event_kind = ?",
        )
        .bind(order_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl OrderStore for SqliteTrustStorage {
    async fn save_order(&self, order: &NewOrder) -> TrustResult<Order> {
        let row = sqlx::query(&format!(
            "INSERT INTO orders \
             (order_number, user_id, guest_email, guest_phone, customer_name, total_amount, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.guest_email.as_deref())
        .bind(&order.guest_phone)
        .bind(order.customer_name.as_deref())
        .bind(order.total_amount)
        .bind(OrderStatus::Pending.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        let saved = Self::order_from_row(&row)?;
        info!(order_id = saved.id, order_number = %saved.order_number, "order saved");
        Ok(saved)
    }

    async fn get_order(&self, id: ModelId) -> TrustResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Self::order_from_row(&row)).transpose()
    }

    async fn mark_cancelled(&self, id: ModelId) -> TrustResult<Order> {
        self.transition(id, OrderStatus::Cancelled).await
    }

    async fn mark_fulfilled(&self, id: ModelId) -> TrustResult<Order> {
        self.transition(id, OrderStatus::Fulfilled).await
    }

    async fn list_pending_older_than(&self, cutoff: DateTime<Utc>) -> TrustResult<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE status = ? AND created_at < ? \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(OrderStatus::Pending.as_str())
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::order_from_row).collect()
    }
}

impl SqliteTrustStorage {
    /// Conditional PENDING -> target transition. The WHERE clause makes the
    /// transition race-safe: whichever caller loses sees zero rows affected
    /// and reports the actual state.
    async fn transition(&self, id: ModelId, target: OrderStatus) -> TrustResult<Order> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ? AND status = ?")
            .bind(target.as_str())
            .bind(id)
            .bind(OrderStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let existing = self
                .get_order(id)
                .await?
                .ok_or(TrustError::OrderNotFound(id))?;
            return Err(TrustError::InvalidState {
                order_id: id,
                status: existing.status,
            });
        }

        let order = self
            .get_order(id)
            .await?
            .ok_or(TrustError::OrderNotFound(id))?;
        info!(order_id = id, status = %order.status, "order transitioned");
        Ok(order)
    }
}
