use incident_desk::{
    app::{self, Stores},
    clock::SystemClock,
    config::Config,
    db::{create_pool, run_migrations},
    notify,
    observability::init_tracing,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability);

    tracing::info!("Starting Incident Desk service");
    tracing::info!("Configuration loaded: {:?}", config.server);

    let stores = if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store; data is lost on restart");
        Stores::memory()
    } else {
        // Create database connection pool
        let db_pool = create_pool(&config.database).await?;
        tracing::info!("Database connection pool created");

        // Run database migrations
        run_migrations(&db_pool).await?;
        tracing::info!("Database migrations completed");

        Stores::postgres(db_pool)
    };

    let mailer = notify::mailer::from_config(&config.notifications)?;
    let application = app::build(&config, stores, mailer, Arc::new(SystemClock))?;

    // Bind server
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server host {}: {}", config.server.host, e))?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Incident Desk service is ready to accept requests");

    axum::serve(listener, application.router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    // The router is gone, so the worker drains its queue and exits
    match tokio::time::timeout(Duration::from_secs(30), application.notification_worker).await {
        Ok(_) => tracing::info!("Pending notifications flushed"),
        Err(_) => tracing::warn!("Timed out flushing pending notifications"),
    }

    tracing::info!("Incident Desk service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
