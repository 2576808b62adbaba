use std::{net::SocketAddr, sync::Arc};

use guildbeat::{
    bridge::HttpBridge,
    catalog::TrackCatalog,
    common::{logger, types::AnyResult},
    configs::Config,
    control::ControlSurface,
    node::{NodeClient, socket},
    player::PlaybackEngine,
    server::AppState,
    settings::StaticSettingsStore,
    transport,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(&config.logging);
    info!("Starting guildbeat v{}", env!("CARGO_PKG_VERSION"));

    let node = Arc::new(NodeClient::new(config.node.clone())?);
    let node_cancel = CancellationToken::new();
    let node_socket = tokio::spawn(socket::run(node.clone(), node_cancel.clone()));

    let catalog = TrackCatalog::new(
        node.clone(),
        config.node.search_prefix.clone(),
        config.playback.resolve_timeout(),
    );
    let engine = PlaybackEngine::new(
        config.playback.clone(),
        catalog,
        node,
        Arc::new(HttpBridge::new(&config.bridge)?),
        Arc::new(StaticSettingsStore::new(&config.tenants)),
    );
    let control = Arc::new(ControlSurface::new(engine));
    info!("{} tenant(s) configured", config.tenants.len());

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = transport::router(AppState::new(config, control.clone()))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("Control API listening on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping all sessions");
    control.stop_all().await;
    node_cancel.cancel();
    if let Err(e) = node_socket.await {
        warn!("Node socket task ended abnormally: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
