use crate::identity::identity_from_headers;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use common::config::BackendConfig;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use trust::engine::ScoreEngine;
use trust::error::TrustError;
use trust::guard::CancellationGuard;
use trust::model::{NewOrder, TrustEventKind};
use trust::settlement::OrderSettlement;
use trust::storage::OrderStore;
use trust::view::TrustView;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScoreEngine>,
    pub guard: Arc<CancellationGuard>,
    pub view: Arc<TrustView>,
    pub orders: Arc<dyn OrderStore>,
    pub settlement: Arc<OrderSettlement>,
}

pub fn initialize_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/score/{phone}", get(get_score))
        .route("/api/suspicious", get(get_suspicious))
        .route("/api/orders", post(place_order))
        .route("/api/orders/{id}/cancel", post(cancel_order))
        .route("/api/orders/{id}/fulfill", post(fulfill_order))
        .route("/api/admin/settle-orders", post(settle_orders))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_backend(
    config: BackendConfig,
    state: AppState,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = router(state);
    tracing::info!("Starting backend service at {}", config.server_address);
    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn get_score(State(state): State<AppState>, Path(phone): Path<String>) -> Response {
    match state.view.score_with_history(&phone).await {
        Ok(payload) => (StatusCode::OK, Json(payload)).into_response(),
        Err(e) => error_response(e, "failed to load customer score"),
    }
}

#[derive(Debug, Deserialize)]
struct SuspiciousParams {
    min_tier: Option<String>,
}

async fn get_suspicious(
    State(state): State<AppState>,
    Query(params): Query<SuspiciousParams>,
) -> Response {
    let min_tier = params.min_tier.unwrap_or_else(|| "warning".to_string());
    match state.view.suspicious(&min_tier).await {
        Ok(customers) => (StatusCode::OK, Json(customers)).into_response(),
        Err(e) => error_response(e, "failed to load suspicious customers"),
    }
}

async fn place_order(State(state): State<AppState>, Json(order): Json<NewOrder>) -> Response {
    if let Err(reason) = order.validate() {
        return error_response(TrustError::InvalidArgument(reason), "rejected order payload");
    }

    let saved = match state.orders.save_order(&order).await {
        Ok(order) => order,
        Err(e) => return error_response(e, "failed to save order"),
    };

    // Counting the placed order is applied within the engine's retry
    // window; a scoring failure does not undo the order itself.
    if let Err(e) = state
        .engine
        .handle_event(
            &saved.guest_phone,
            TrustEventKind::Placed,
            saved.id,
            saved.customer_name.as_deref(),
            None,
        )
        .await
    {
        tracing::error!(
            order_id = saved.id,
            error = %e,
            "failed to record placed order in trust score"
        );
    }

    (StatusCode::CREATED, Json(saved)).into_response()
}

async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let identity = identity_from_headers(&headers);
    match state.guard.cancel(id, &identity).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => error_response(e, "order cancellation rejected"),
    }
}

async fn fulfill_order(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    // Fulfillment comes from the pipeline, a trusted collaborator; there is
    // no ownership check on this path.
    let order = match state.orders.mark_fulfilled(id).await {
        Ok(order) => order,
        Err(e) => return error_response(e, "order fulfillment rejected"),
    };

    if let Err(e) = state
        .engine
        .handle_event(
            &order.guest_phone,
            TrustEventKind::Fulfilled,
            order.id,
            order.customer_name.as_deref(),
            Some(order.total_amount),
        )
        .await
    {
        tracing::error!(
            order_id = order.id,
            error = %e,
            "failed to record fulfillment in trust score"
        );
    }

    (StatusCode::OK, Json(order)).into_response()
}

async fn settle_orders(State(state): State<AppState>) -> Response {
    match state.settlement.settle_aged(Utc::now()).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => error_response(e, "aged-order settlement failed"),
    }
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

fn error_response(e: TrustError, context: &str) -> Response {
    let status = match &e {
        TrustError::Unauthorized => StatusCode::UNAUTHORIZED,
        TrustError::Forbidden(_) => StatusCode::FORBIDDEN,
        TrustError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        TrustError::InvalidState { .. } => StatusCode::CONFLICT,
        TrustError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        TrustError::Conflict => StatusCode::CONFLICT,
        TrustError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "{context}");
    } else {
        tracing::debug!(error = %e, "{context}");
    }
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}
