use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use termchat_server::config::Config;
use termchat_server::dispatcher::Shared;
use termchat_server::room_cache::RoomCache;
use termchat_server::session_registry::SessionRegistry;
use termchat_server::store::memory::MemStore;
use termchat_server::store::postgres::PostgresStore;
use termchat_server::listener;
use termchat_server::store::ChatStore;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    let store: Arc<dyn ChatStore> = match &config.database_url {
        Some(database_url) => {
            info!("connecting to database...");
            let store = PostgresStore::connect(database_url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("failed to run migrations");
            info!("migrations applied");
            Arc::new(store)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemStore::new())
        }
    };

    let shared = Shared {
        store,
        registry: Arc::new(SessionRegistry::new()),
        rooms: Arc::new(RoomCache::new()),
    };

    let bind_addr = config.bind_addr.clone();
    tokio::select! {
        result = listener::run(&bind_addr, shared) => {
            if let Err(e) = result {
                panic!("listener failed: {e}");
            }
        }
        _ = shutdown_signal() => {
            info!("shutting down");
        }
    }
}

/// Waits for SIGTERM or Ctrl-C (SIGINT). spec.md §4.6 specifies no graceful
/// shutdown protocol; this only stops the accept loop, it does not drain
/// in-flight connections.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => { info!("received Ctrl+C"); },
        _ = terminate => { info!("received SIGTERM"); },
    }
}
