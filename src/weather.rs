use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const FORECAST_ENTRIES: u32 = 40;
pub const SEARCH_LIMIT: u32 = 5;

/// Current conditions, flattened out of the provider's nested response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub city: String,
    pub country: String,
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u32,
    pub wind_speed: f64,
    pub wind_deg: u32,
    pub description: String,
    pub icon: String,
    pub sunrise: i64,
    pub sunset: i64,
    pub visibility: u32,
    pub pressure: u32,
}

/// One 3-hour step of a forecast. `precipitation` is a probability in 0.0..=1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastItem {
    pub dt: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub description: String,
    pub icon: String,
    pub precipitation: f64,
}

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("location not found upstream")]
    NotFound,
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    Status(StatusCode),
    #[error("JSON parsing failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("malformed upstream response: {0}")]
    Malformed(&'static str),
}

impl WeatherError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WeatherError::NotFound)
    }
}

#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn current_by_city(&self, city: &str) -> Result<CurrentWeather, WeatherError>;
    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError>;
    async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastItem>, WeatherError>;
    /// Raw geocoding results, passed through untouched.
    async fn search_cities(&self, query: &str) -> Result<serde_json::Value, WeatherError>;
}

// OpenWeatherMap wire shapes. Only the fields we flatten are declared.

#[derive(Debug, Deserialize)]
struct OwmCurrentResponse {
    name: String,
    sys: OwmSys,
    main: OwmMain,
    wind: OwmWind,
    weather: Vec<OwmCondition>,
    #[serde(default)]
    visibility: u32,
}

#[derive(Debug, Deserialize)]
struct OwmSys {
    #[serde(default)]
    country: String,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u32,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    speed: f64,
    #[serde(default)]
    deg: u32,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmForecastResponse {
    list: Vec<OwmForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastEntry {
    dt: i64,
    main: OwmForecastMain,
    weather: Vec<OwmCondition>,
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastMain {
    temp: f64,
    feels_like: f64,
}

impl TryFrom<OwmCurrentResponse> for CurrentWeather {
    type Error = WeatherError;

    fn try_from(raw: OwmCurrentResponse) -> Result<Self, Self::Error> {
        let condition = raw
            .weather
            .into_iter()
            .next()
            .ok_or(WeatherError::Malformed("missing weather conditions"))?;

        Ok(Self {
            city: raw.name,
            country: raw.sys.country,
            temp: raw.main.temp,
            feels_like: raw.main.feels_like,
            temp_min: raw.main.temp_min,
            temp_max: raw.main.temp_max,
            humidity: raw.main.humidity,
            wind_speed: raw.wind.speed,
            wind_deg: raw.wind.deg,
            description: condition.description,
            icon: condition.icon,
            sunrise: raw.sys.sunrise,
            sunset: raw.sys.sunset,
            visibility: raw.visibility,
            pressure: raw.main.pressure,
        })
    }
}

impl TryFrom<OwmForecastEntry> for ForecastItem {
    type Error = WeatherError;

    fn try_from(raw: OwmForecastEntry) -> Result<Self, Self::Error> {
        let condition = raw
            .weather
            .into_iter()
            .next()
            .ok_or(WeatherError::Malformed("missing forecast conditions"))?;

        Ok(Self {
            dt: raw.dt,
            temp: raw.main.temp,
            feels_like: raw.main.feels_like,
            description: condition.description,
            icon: condition.icon,
            precipitation: raw.pop.unwrap_or(0.0),
        })
    }
}

pub struct OpenWeatherProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: String) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent("weather-card-backend/0.1")
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, params.iter().map(|(k, _)| *k).collect::<Vec<_>>());

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(WeatherError::NotFound),
            status if status.is_success() => {
                let body = response.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            }
            status => Err(WeatherError::Status(status)),
        }
    }
}

#[async_trait::async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn name(&self) -> &str {
        "OpenWeatherMap"
    }

    async fn current_by_city(&self, city: &str) -> Result<CurrentWeather, WeatherError> {
        info!("🌤️  Fetching current weather from OpenWeatherMap for {}", city);
        let raw: OwmCurrentResponse = self
            .get_json(
                "/data/2.5/weather",
                &[("q", city.to_string()), ("units", "metric".to_string())],
            )
            .await?;
        raw.try_into()
    }

    async fn current_by_coords(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError> {
        info!("🌤️  Fetching current weather from OpenWeatherMap for {}, {}", lat, lon);
        let raw: OwmCurrentResponse = self
            .get_json(
                "/data/2.5/weather",
                &[
                    ("lat", lat.to_string()),
                    ("lon", lon.to_string()),
                    ("units", "metric".to_string()),
                ],
            )
            .await?;
        raw.try_into()
    }

    async fn forecast_by_city(&self, city: &str) -> Result<Vec<ForecastItem>, WeatherError> {
        info!("📅 Fetching forecast from OpenWeatherMap for {}", city);
        let raw: OwmForecastResponse = self
            .get_json(
                "/data/2.5/forecast",
                &[
                    ("q", city.to_string()),
                    ("units", "metric".to_string()),
                    ("cnt", FORECAST_ENTRIES.to_string()),
                ],
            )
            .await?;
        raw.list.into_iter().map(ForecastItem::try_from).collect()
    }

    async fn search_cities(&self, query: &str) -> Result<serde_json::Value, WeatherError> {
        info!("🔎 Geocoding search for {}", query);
        self.get_json(
            "/geo/1.0/direct",
            &[("q", query.to_string()), ("limit", SEARCH_LIMIT.to_string())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn paris_body() -> serde_json::Value {
        json!({
            "name": "Paris",
            "sys": {"country": "FR", "sunrise": 1, "sunset": 2},
            "main": {"temp": 20, "feels_like": 19, "temp_min": 18, "temp_max": 22, "humidity": 50, "pressure": 1012},
            "wind": {"speed": 3, "deg": 180},
            "weather": [{"description": "clear sky", "icon": "01d"}],
            "visibility": 10000
        })
    }

    fn provider(server: &MockServer) -> OpenWeatherProvider {
        OpenWeatherProvider::new("test-key".to_string(), server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_current_by_city_normalizes_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Paris"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let weather = provider(&mock_server).current_by_city("Paris").await.unwrap();

        assert_eq!(
            weather,
            CurrentWeather {
                city: "Paris".to_string(),
                country: "FR".to_string(),
                temp: 20.0,
                feels_like: 19.0,
                temp_min: 18.0,
                temp_max: 22.0,
                humidity: 50,
                wind_speed: 3.0,
                wind_deg: 180,
                description: "clear sky".to_string(),
                icon: "01d".to_string(),
                sunrise: 1,
                sunset: 2,
                visibility: 10000,
                pressure: 1012,
            }
        );
    }

    #[test]
    fn test_current_weather_serializes_camel_case() {
        let raw: OwmCurrentResponse = serde_json::from_value(paris_body()).unwrap();
        let weather = CurrentWeather::try_from(raw).unwrap();
        let value = serde_json::to_value(&weather).unwrap();

        assert_eq!(value["city"], "Paris");
        assert_eq!(value["feelsLike"], 19.0);
        assert_eq!(value["tempMin"], 18.0);
        assert_eq!(value["tempMax"], 22.0);
        assert_eq!(value["windSpeed"], 3.0);
        assert_eq!(value["windDeg"], 180);
        assert_eq!(value["visibility"], 10000);
        assert!(value.get("feels_like").is_none());
    }

    #[tokio::test]
    async fn test_current_by_coords_sends_lat_lon() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("lat", "48.8566"))
            .and(query_param("lon", "2.3522"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let weather = provider(&mock_server)
            .current_by_coords(48.8566, 2.3522)
            .await
            .unwrap();
        assert_eq!(weather.city, "Paris");
    }

    #[tokio::test]
    async fn test_upstream_404_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"cod": "404", "message": "city not found"})),
            )
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server)
            .current_by_city("Nonexistentville")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upstream_401_is_other_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server).forecast_by_city("Paris").await.unwrap_err();
        assert!(matches!(err, WeatherError::Status(StatusCode::UNAUTHORIZED)));
    }

    #[tokio::test]
    async fn test_missing_conditions_is_malformed() {
        let mock_server = MockServer::start().await;
        let mut body = paris_body();
        body["weather"] = json!([]);

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server).current_by_city("Paris").await.unwrap_err();
        assert!(matches!(err, WeatherError::Malformed(_)));
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_non_json_body_is_decode_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let err = provider(&mock_server).current_by_city("Paris").await.unwrap_err();
        assert!(matches!(err, WeatherError::Decode(_)));
    }

    #[tokio::test]
    async fn test_forecast_keeps_order_and_defaults_pop() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("q", "Paris"))
            .and(query_param("cnt", "40"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cod": "200",
                "list": [
                    {"dt": 300, "main": {"temp": 21.5, "feels_like": 21.0}, "weather": [{"description": "light rain", "icon": "10d"}], "pop": 0.42},
                    {"dt": 100, "main": {"temp": 19.0, "feels_like": 18.2}, "weather": [{"description": "few clouds", "icon": "02d"}]},
                    {"dt": 200, "main": {"temp": 17.3, "feels_like": 16.9}, "weather": [{"description": "clear sky", "icon": "01n"}], "pop": 0}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let forecast = provider(&mock_server).forecast_by_city("Paris").await.unwrap();

        assert_eq!(forecast.iter().map(|f| f.dt).collect::<Vec<_>>(), vec![300, 100, 200]);
        assert_eq!(forecast[0].precipitation, 0.42);
        assert_eq!(forecast[1].precipitation, 0.0);
        assert_eq!(forecast[1].feels_like, 18.2);
        assert_eq!(forecast[2].icon, "01n");
    }

    #[tokio::test]
    async fn test_search_passes_raw_json_through() {
        let mock_server = MockServer::start().await;
        let raw = json!([
            {"name": "Paris", "lat": 48.8589, "lon": 2.32, "country": "FR", "local_names": {"fr": "Paris"}},
            {"name": "Paris", "lat": 33.66, "lon": -95.55, "country": "US", "state": "Texas"}
        ]);

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Paris"))
            .and(query_param("limit", "5"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(raw.clone()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server).search_cities("Paris").await.unwrap();
        assert_eq!(result, raw);
    }
}
