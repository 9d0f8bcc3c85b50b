use std::sync::Arc;

use clap::Parser;
use item_desk::config::{Cli, Config, default_config_path};
use item_desk::handler::AppState;
use item_desk::publisher::{AssetHost, ImagePublisher};
use item_desk::routes::routes;
use item_desk::s3::ObjectStorage;
use item_desk::telemetry::EventRelay;
use item_desk::upstream::{HttpUpstream, ItemMaster};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    dotenvy::dotenv().ok();

    let config_path = args
        .config_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(default_config_path);

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("item-desk.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let items = ItemMaster::new(Arc::new(HttpUpstream::new(cfg.upstream.clone())));
    let host = ObjectStorage::from_storage(&cfg.storage)
        .await
        .map(|s3| Arc::new(s3) as Arc<dyn AssetHost>);
    let publisher = ImagePublisher::new(host, &cfg.storage);
    let events = EventRelay::from_config(&cfg.telemetry);

    let app = routes(AppState {
        items,
        publisher,
        events,
    });

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            ctrl_c_token.cancel();
        }
    });

    tracing::info!("item-desk.svc running on {}", &address);
    let shutdown = cancellation_token.clone();
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }

    tracing::info!("item-desk.svc going off, graceful shutdown complete");
}
