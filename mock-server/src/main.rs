use std::sync::Arc;

use mock_server::{MockConfig, MockState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let config = MockConfig {
        token: std::env::var("LEXOFFICE_MOCK_TOKEN").ok(),
        ..MockConfig::default()
    };
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, auth = config.token.is_some(), "mock lexoffice listening");
    mock_server::run_with(listener, Arc::new(MockState::new(config))).await
}
