use axum::{
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

mod client;
mod constants;
mod handlers;
mod models;
mod services;
mod utils;

use client::MesClient;
use handlers::conversion;
use services::ConversionStateStore;
use utils::PlantClock;

#[derive(Clone)]
pub struct AppState {
    pub mes: Arc<MesClient>,
    pub store: Arc<ConversionStateStore>,
    pub clock: PlantClock,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").field("mes", &self.mes).finish()
    }
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub timestamp: String,
    pub version: String,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        message: "Item conversion backend is running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: VERSION.to_string(),
    })
}

#[tokio::main]
async fn main() {
    // Initialize tracing with environment-based filtering
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "item_convert_backend=info,tower_http=warn".to_string()
        } else {
            "item_convert_backend=warn,tower_http=error".to_string()
        }
    });
    std::env::set_var("RUST_LOG", &log_level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("🚀 Starting Item Conversion Backend v{}", VERSION);

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let host = std::env::var("SERVER_HOST")
        .unwrap_or_else(|_| constants::DEFAULT_SERVER_HOST.to_string());
    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(constants::DEFAULT_SERVER_PORT);

    let cors_origins = std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
    info!("Server configured to run on {}:{}", host, port);
    info!("CORS origins: {}", cors_origins);

    let cors = if cors_origins == "*" {
        warn!("⚠️ CORS is configured with wildcard (*) - only acceptable for development!");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<axum::http::HeaderValue> = cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    let mes = Arc::new(MesClient::from_env().expect("MES client configuration failed"));
    let clock = PlantClock::from_env().expect("Plant clock configuration failed");
    info!("Remote MES client initialized");

    let state = AppState {
        mes,
        store: Arc::new(ConversionStateStore::new()),
        clock,
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .nest("/api/convert", conversion::create_convert_routes())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&format!("{host}:{port}"))
        .await
        .expect("Failed to bind to address");

    info!("🎯 Conversion server started on http://{}:{}", host, port);
    info!("🔧 API endpoints available at http://{}:{}/api/", host, port);

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
