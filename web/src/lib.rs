use log::*;
use sse::StreamRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;

pub use error::{Error, Result};
pub use service::AppState;

mod controller;
mod error;
mod params;
pub(crate) mod router;
mod streaming;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let listen_addr = app_state.config.listen_addr();
    let registry = Arc::clone(&app_state.sse_registry);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let listener = TcpListener::bind(&listen_addr).await?;
    let router = router::define_routes(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
}

// Open event streams never end on their own, so the registry is shut down
// first to cancel every connection and let the server drain.
async fn shutdown_signal(registry: Arc<StreamRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {e}");
        return;
    }

    info!("Shutdown signal received, closing all event streams");
    registry.shutdown();
}
