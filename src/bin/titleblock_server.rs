use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;

use titleblock_annotator::config::init_tracing;
use titleblock_annotator::server::{router, AppState, ServerConfig};
use titleblock_annotator::store::JsonFileStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing("titleblock_annotator=info,tower_http=info");

    let config = ServerConfig::from_env().expect("PORT must be a valid u16");
    let store = JsonFileStore::open(&config.pages_dir).expect("Failed to open pages directory");
    tracing::info!(pages_dir = %store.root().display(), "page store opened");

    let app = router(AppState {
        store: Arc::new(store),
    })
    .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.host.parse().expect("Invalid HOST"), config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
