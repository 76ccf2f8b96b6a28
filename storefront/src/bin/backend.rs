use clap::Parser;
use common::config::Config;
use std::error::Error;
use std::sync::Arc;
use storefront::server::{AppState, initialize_tracing, run_backend};
use storefront::sqlite_trust_storage::SqliteTrustStorage;
use trust::engine::ScoreEngine;
use trust::guard::CancellationGuard;
use trust::policy::ScorePolicy;
use trust::settlement::OrderSettlement;
use trust::storage::{HistoryLedger, OrderStore, ScoreStore};
use trust::view::TrustView;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/trust_config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    initialize_tracing(&config.backend.log_level);

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| config.common.database_url.clone());
    let storage = Arc::new(SqliteTrustStorage::new(&database_url).await?);
    storage.initialize_schema().await?;

    let scores: Arc<dyn ScoreStore> = storage.clone();
    let ledger: Arc<dyn HistoryLedger> = storage.clone();
    let orders: Arc<dyn OrderStore> = storage.clone();

    let engine = Arc::new(ScoreEngine::new(
        scores.clone(),
        ledger.clone(),
        ScorePolicy::default(),
    ));
    let guard = Arc::new(CancellationGuard::new(orders.clone(), engine.clone()));
    let view = Arc::new(TrustView::new(scores, ledger));
    let settlement = Arc::new(OrderSettlement::new(orders.clone(), engine.clone()));

    let state = AppState {
        engine,
        guard,
        view,
        orders,
        settlement,
    };
    run_backend(config.backend, state).await
}
