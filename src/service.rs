use std::sync::Arc;
use tracing::info;

use crate::cache::{self, CacheStats, CachedWeather, WeatherCache};
use crate::weather::{CurrentWeather, ForecastItem, WeatherError, WeatherProvider};

/// Resolves weather queries through the cache, going upstream at most
/// once per miss.
pub struct WeatherService {
    provider: Arc<dyn WeatherProvider>,
    cache: WeatherCache,
}

impl WeatherService {
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: WeatherCache) -> Self {
        Self { provider, cache }
    }

    pub async fn get_current_weather(&self, city: &str) -> Result<CurrentWeather, WeatherError> {
        let key = cache::current_key(city);
        if let Some(CachedWeather::Current(weather)) = self.cache.get(&key).await {
            info!("📦 Returning cached data for {}", key);
            return Ok(weather);
        }

        let weather = self.provider.current_by_city(city).await?;
        self.cache.set(key.clone(), CachedWeather::Current(weather.clone())).await;
        info!("💾 Cached {} data for {}", self.provider.name(), key);

        Ok(weather)
    }

    pub async fn get_forecast(&self, city: &str) -> Result<Arc<Vec<ForecastItem>>, WeatherError> {
        let key = cache::forecast_key(city);
        if let Some(CachedWeather::Forecast(forecast)) = self.cache.get(&key).await {
            info!("📦 Returning cached data for {}", key);
            return Ok(forecast);
        }

        let forecast = Arc::new(self.provider.forecast_by_city(city).await?);
        self.cache.set(key.clone(), CachedWeather::Forecast(Arc::clone(&forecast))).await;
        info!("💾 Cached {} data for {}", self.provider.name(), key);

        Ok(forecast)
    }

    pub async fn get_weather_by_coords(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError> {
        let key = cache::coords_key(lat, lon);
        if let Some(CachedWeather::Current(weather)) = self.cache.get(&key).await {
            info!("📦 Returning cached data for {}", key);
            return Ok(weather);
        }

        let weather = self.provider.current_by_coords(lat, lon).await?;
        self.cache.set(key.clone(), CachedWeather::Current(weather.clone())).await;
        info!("💾 Cached {} data for {}", self.provider.name(), key);

        Ok(weather)
    }

    /// Geocoding is never cached.
    pub async fn search_cities(&self, query: &str) -> Result<serde_json::Value, WeatherError> {
        self.provider.search_cities(query).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
