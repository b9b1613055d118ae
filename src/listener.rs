//! TCP accept loop (spec.md §4.6).

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatcher::{self, Shared};

/// Binds `bind_addr` and spawns a [`dispatcher::run_connection`] task per
/// accepted connection, forever. Accept errors are logged and the loop
/// continues (spec.md §4.6); there is no graceful shutdown protocol beyond
/// process signal, matching the teacher's `shutdown_signal` pattern for the
/// process as a whole (see `main.rs`).
pub async fn run(bind_addr: &str, shared: Shared) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "listening");

    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                info!(%peer, "accepted connection");
                let shared = shared.clone();
                tokio::spawn(async move {
                    dispatcher::run_connection(shared, socket, peer).await;
                    info!(%peer, "connection closed");
                });
            }
            Err(e) => {
                error!(error = %e, "accept failed, continuing");
            }
        }
    }
}
