//! # Roster API Server
//!
//! CRUD over a single user resource backed by PostgreSQL.
//!
//! ## Startup
//!
//! 1. Load configuration; a missing `DATABASE_URL` is fatal
//! 2. Start the database connect-retry loop in the background
//! 3. Serve HTTP right away; `/api` answers 503 until the database connects
//! 4. Once connected, ping the database every retry interval so `/api` and
//!    `/health` follow outages and recoveries
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/roster cargo run -p roster-api
//! ```

use anyhow::Context;
use roster_api::{
    app::{build_router, AppState},
    config::Config,
};
use roster_shared::db::postgres::PgUserStore;
use roster_shared::{ConnectionState, DbClient, UserStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_api=debug,roster_shared=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Roster API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            return Err(err.into());
        }
    };

    let db = Arc::new(DbClient::new());

    let connector = {
        let db = db.clone();
        let database = config.database.clone();
        let retry = config.retry;
        tokio::spawn(async move {
            let state = db
                .connect_with_retry(
                    move || {
                        let database = database.clone();
                        async move {
                            let store = PgUserStore::connect(database).await?;
                            Ok(Arc::new(store) as Arc<dyn UserStore>)
                        }
                    },
                    retry,
                )
                .await;

            if state == ConnectionState::Connected {
                db.monitor(retry.interval).await;
            }
        })
    };

    let app = build_router(AppState::new(db.clone()));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!("Server running on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing database...");
    connector.abort();
    db.disconnect().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
