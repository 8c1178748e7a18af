use cryptoscope::api;
use cryptoscope::config::Config;
use cryptoscope::services::{Engine, EngineSettings, Poller, SignalHistory, SqliteStore, TradingService};
use cryptoscope::sources::{BinanceClient, CachedMarketData};
use cryptoscope::AppState;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cryptoscope=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Cryptoscope on {}:{}", config.host, config.port);

    // Persistence
    let sqlite = Arc::new(SqliteStore::new(&config.sqlite_path)?);

    let trading = Arc::new(TradingService::new(sqlite.clone(), config.initial_capital));
    trading.load()?;
    let history = SignalHistory::new(sqlite, &config.scoring);
    history.load();

    // Market data behind a short-lived cache
    let binance = BinanceClient::new(config.binance_api_url.clone(), config.binance_api_key.clone());
    let market = Arc::new(CachedMarketData::new(binance, config.cache_ttl()));

    // Sweep entries for symbols nobody asks about any more
    {
        let market = market.clone();
        let period = (config.cache_ttl() * 10).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = market.purge_expired();
                if purged > 0 {
                    debug!("Purged {} expired market data entries", purged);
                }
            }
        });
    }

    let engine = Arc::new(Engine::new(
        market,
        config.scoring.clone(),
        trading,
        history,
        EngineSettings::from_config(&config),
    ));
    if config.auto_trade {
        info!(
            "Auto trading enabled: {}% of free capital per BUY",
            config.trade_allocation_pct
        );
    }

    // Start the refresh loop
    let poller = Arc::new(Poller::new(
        engine.clone(),
        config.symbols.clone(),
        config.poll_interval(),
    ));
    let poller_task = {
        let poller = poller.clone();
        tokio::spawn(async move { poller.start().await })
    };

    let state = AppState {
        config: config.clone(),
        engine,
        poller: poller.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Cryptoscope listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the in-flight refresh cycle finish
    poller.stop();
    if let Err(e) = poller_task.await {
        error!("Poller task failed: {}", e);
    }
    info!("Cryptoscope stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
