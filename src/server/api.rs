use crate::models::registry::{ self, Model };
use std::error::Error;
use std::net::SocketAddr;
use axum::{ routing::get, Router, Json };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<Model>,
}

pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/models", get(models_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
}

pub async fn start_http_server(http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router();
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            }
        }
    });

    info!("HTTP server started");
    Ok(())
}

async fn models_handler() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: registry::all().to_vec(),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
