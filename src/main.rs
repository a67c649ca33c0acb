use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cache;
mod config;
mod routes;
mod service;
mod templates;
mod weather;

use cache::WeatherCache;
use config::Config;
use routes::AppState;
use service::WeatherService;
use weather::OpenWeatherProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load()?;

    let provider = Arc::new(OpenWeatherProvider::new(
        config.openweather_api_key.clone(),
        config.openweather_base_url.clone(),
    )?);

    // The cache lives as long as the service; both are dropped on shutdown.
    let cache = WeatherCache::new(Duration::from_secs(config.cache_ttl_seconds));
    let weather = Arc::new(WeatherService::new(provider, cache));

    let state = AppState {
        weather,
        default_city: Arc::from(config.default_city.as_str()),
    };

    let app = routes::router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        "🦀 Weather server starting on http://{} (cache TTL {}s)",
        addr, config.cache_ttl_seconds
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
