use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use yieldsim::{api, config::Config, db::init_db, LifecycleManager, LlamaPoolFeed, Repository, Ticker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("failed to initialize database")?;
    let store = Arc::new(Repository::new(pool));

    let feed = LlamaPoolFeed::new(config.pool_feed_url.clone(), config.feed.clone())
        .context("failed to build pool feed client")?;
    let manager = LifecycleManager::new(Arc::new(feed), store.clone(), config.strategy.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ticker = tokio::spawn(Ticker::new(manager, config.strategy.tick_interval).run(shutdown_rx));

    let app = api::create_router(api::AppState::new(store, config.strategy.clone()));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
        .context("server error")?;

    tracing::info!("Shutting down lifecycle ticker");
    let _ = shutdown_tx.send(true);
    ticker.await.context("lifecycle ticker panicked")?;
    Ok(())
}
