use std::net::SocketAddr;
use std::sync::Arc;

use common::storage::FilesystemFileStore;
use tracing::{Level, info};

use tplearn_server::config::AppConfig;
use tplearn_server::database::init_db;
use tplearn_server::seed::{ensure_bootstrap_admin, ensure_indexes};
use tplearn_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load()?;

    let db = init_db(&config.database.url).await?;
    ensure_indexes(&db).await?;
    ensure_bootstrap_admin(&db, &config.auth).await?;

    let store = FilesystemFileStore::new(
        config.storage.base_dir.clone(),
        config.storage.max_upload_size,
    )
    .await?;
    info!(base_dir = %config.storage.base_dir.display(), "Upload storage ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState {
        db,
        config,
        store: Arc::new(store),
    };
    let app = tplearn_server::build_router(state);

    info!("Server running at http://{}", addr);
    info!("API reference at http://{}/scalar", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
