use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use snakepit_backend::api;
use snakepit_backend::config::Config;
use snakepit_backend::db::Database;
use snakepit_backend::engine::LocalEngine;
use snakepit_backend::metrics;
use snakepit_backend::service::BracketService;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "snakepit-backend" }))
}

async fn metrics_endpoint() -> String {
    metrics::gather_metrics()
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let engine = Arc::new(LocalEngine::new());
    let service = Arc::new(BracketService::new(db.clone(), engine));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_endpoint))
        .merge(api::router(db, service, config.board_url.clone()))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind port");

    tracing::info!("Snakepit backend listening on port {}", config.port);
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
