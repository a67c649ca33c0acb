use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::weather::{CurrentWeather, ForecastItem};

pub fn current_key(city: &str) -> String {
    format!("current:{}", city.to_lowercase())
}

pub fn forecast_key(city: &str) -> String {
    format!("forecast:{}", city.to_lowercase())
}

/// Ties round away from zero and `-0.0` folds into `0.0`, so nearby
/// points share one entry.
pub fn coords_key(lat: f64, lon: f64) -> String {
    let round = |value: f64| (value * 100.0).round() / 100.0 + 0.0;
    format!("coords:{:.2},{:.2}", round(lat), round(lon))
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedWeather {
    Current(CurrentWeather),
    Forecast(Arc<Vec<ForecastItem>>),
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub entry_count: u64,
    pub ttl_seconds: u64,
    pub keys: Vec<String>,
}

/// Time-expiring lookup shared by every request. Unbounded; entries
/// past their TTL read as absent and are replaced on the next miss.
pub struct WeatherCache {
    cache: Cache<String, CachedWeather>,
    ttl: Duration,
}

impl WeatherCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();

        Self { cache, ttl }
    }

    pub async fn get(&self, key: &str) -> Option<CachedWeather> {
        self.cache.get(key).await
    }

    pub async fn set(&self, key: String, value: CachedWeather) {
        self.cache.insert(key, value).await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;

        let mut keys: Vec<String> = self.cache.iter().map(|(key, _)| key.to_string()).collect();
        keys.sort();

        CacheStats {
            entry_count: self.cache.entry_count(),
            ttl_seconds: self.ttl.as_secs(),
            keys,
        }
    }
}
