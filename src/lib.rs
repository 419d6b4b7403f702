pub mod cli;
pub mod controller;
pub mod llm;
pub mod models;
pub mod server;
pub mod store;

use cli::Args;
use llm::ResponseFetcher;
use llm::backend::HttpChatBackend;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP API Port: {:?}", args.http_port);
    info!("Backend URL: {}", args.backend_url);
    info!("Backend Timeout: {:?}", args.backend_timeout());
    info!("Mock Delay: {:?}", args.mock_delay());
    info!("Default Model: {}", args.default_model);
    info!("Default Comparison Models: {} vs {}", args.default_left_model, args.default_right_model);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let defaults = args.model_defaults();
    defaults.validate()?;

    let backend = HttpChatBackend::new(Some(args.backend_url.clone()), args.backend_timeout())?;
    info!("Chat backend configured at {}", backend.url());
    let fetcher = ResponseFetcher::new(Arc::new(backend), args.mock_delay());

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, fetcher, defaults, args.server_api_key.clone(), args.clone());
    server.run().await?;

    Ok(())
}
