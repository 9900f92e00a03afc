use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use blog::auth::session::{spawn_purge_task, SqliteSessionStore};
use blog::auth::BcryptHasher;
use blog::config::{Cli, Config};
use blog::db::{self, SqliteStore};
use blog::routes;
use blog::state::AppState;
use clap::Parser;
use tracing_subscriber::EnvFilter;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    let db_path = config.db_path();
    tracing::info!("Database: {}", db_path.display());

    // Initialize database
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;

    let sessions = Arc::new(SqliteSessionStore::new(
        pool.clone(),
        config.auth.session_hours,
    ));
    spawn_purge_task(sessions.clone(), SESSION_PURGE_INTERVAL);

    let state = AppState {
        store: Arc::new(SqliteStore::new(pool)),
        sessions,
        hasher: Arc::new(BcryptHasher::new(config.auth.bcrypt_cost)),
        signer: config.session_signer(),
        config: config.clone(),
    };

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
