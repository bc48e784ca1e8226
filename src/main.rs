use log::*;
use service::{config::Config, init_registry, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();

    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to initialize logger: {e}");
        std::process::exit(1);
    }

    info!("Starting up SSE Relay...");

    let registry = sse::global::install(init_registry(&config));
    let app_state = AppState::new(config, &registry);
    let reaper = app_state.start_cleanup();

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with error: {e}");
        sse::global::teardown();
        std::process::exit(1);
    }

    // The reaper stops with the registry's shutdown
    if let Err(e) = reaper.await {
        warn!("Idle-thread reaper ended abnormally: {e}");
    }
    sse::global::teardown();

    info!("SSE Relay stopped");
}
