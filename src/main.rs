use std::sync::Arc;

use anyhow::Result;
use smalltalk::{
    api,
    config::Config,
    session::Session,
    storage::{DeviceStorage, FileStorage},
    store::{LocalStore, RemoteStore, SqliteStore},
    sync::Synchronizer,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smalltalk=debug,info")))
        .with(fmt::layer())
        .init();

    let config = Config::from_env()?;

    let storage: Arc<dyn DeviceStorage> = Arc::new(FileStorage::open(&config.data_dir)?);
    let store: Arc<dyn RemoteStore> = match &config.database_url {
        Some(url) => Arc::new(SqliteStore::connect(url, config.max_connections).await?),
        None => {
            info!(data_dir = %config.data_dir.display(), "no DATABASE_URL, running on the local data set");
            Arc::new(LocalStore::open(storage.clone())?)
        }
    };

    let session = Session::restore(storage);
    let sync = Synchronizer::new(store, session);
    let realtime = sync.mount().await;

    let app = api::app(sync)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drop(realtime);
    info!("change subscription closed");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
