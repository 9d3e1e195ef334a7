use axum::{routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

use crate::dashboard::dashboard_metrics::{events, get_health, get_metrics};
use crate::dashboard::dashboard_queue::{get_queue, get_queue_jobs, get_queue_keys, get_queues};
use crate::QlensEngine;

pub fn router(engine: QlensEngine) -> Router {
    Router::new()
        .route("/queues", get(get_queues))
        .route("/queues/{id}", get(get_queue))
        .route("/queues/{id}/keys", get(get_queue_keys))
        .route("/queues/{id}/jobs/{status}", get(get_queue_jobs))
        .route("/metrics", get(get_metrics))
        .route("/health", get(get_health))
        .route("/events", get(events))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

pub async fn start_dashboard_server(engine: QlensEngine, addr: &str) -> std::io::Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Dashboard available at http://{}", addr);
    axum::serve(listener, app).await
}
