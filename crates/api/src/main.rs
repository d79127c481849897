//! API server entry point.

use api::config::Config;
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: EventStore + Clone + 'static>(store: S, config: Config) {
    // Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let (state, engine) = api::create_default_state(store);

    // Run the projection engine as a long-lived background task, decoupled
    // from request lifetimes.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(shutdown_rx).await }
    });

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Stop the projection engine: it finishes in-flight event application
    // and releases its cursors before returning.
    let _ = shutdown_tx.send(true);
    match engine_task.await {
        Ok(Ok(())) => tracing::info!("projection engine stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "projection engine failed"),
        Err(e) => tracing::error!(error = %e, "projection engine panicked"),
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match config.database_url.clone() {
        Some(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
                .expect("failed to connect to database");

            let store = PostgresEventStore::new(pool);
            store.run_migrations().await.expect("migrations failed");

            tracing::info!("using PostgreSQL event store");
            serve(store, config).await;
        }
        None => {
            tracing::info!("no DATABASE_URL set, using in-memory event store");
            serve(InMemoryEventStore::new(), config).await;
        }
    }
}
