use anyhow::{anyhow, Result};
use std::env;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 600;

#[derive(Debug, Clone)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub port: u16,
    pub cache_ttl_seconds: u64,
    pub default_city: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openweather_api_key = lookup("OPENWEATHER_API_KEY")
            .filter(|key| !key.is_empty() && key != "YOUR_API_KEY_HERE")
            .ok_or_else(|| anyhow!("OPENWEATHER_API_KEY not set"))?;

        let openweather_base_url = lookup("OPENWEATHER_BASE_URL")
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let port = lookup("PORT")
            .and_then(|port| port.parse().ok())
            .unwrap_or(5001);

        let cache_ttl_seconds = lookup("CACHE_TTL_SECONDS")
            .and_then(|ttl| ttl.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECONDS);

        let default_city = lookup("DEFAULT_CITY")
            .filter(|city| !city.trim().is_empty())
            .unwrap_or_else(|| "London".to_string());

        Ok(Self {
            openweather_api_key,
            openweather_base_url,
            port,
            cache_ttl_seconds,
            default_city,
        })
    }
}
