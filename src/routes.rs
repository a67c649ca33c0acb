use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, warn};

use crate::service::WeatherService;
use crate::templates::{ErrorTemplate, WeatherCardTemplate};
use crate::weather::WeatherError;

#[derive(Clone)]
pub struct AppState {
    pub weather: Arc<WeatherService>,
    pub default_city: Arc<str>,
}

#[derive(Deserialize)]
pub struct CoordsQuery {
    lat: Option<String>,
    lon: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    message: &'static str,
}

fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, Json(ErrorResponse { message })).into_response()
}

/// City-keyed endpoints: upstream 404 surfaces as 404, everything else as 500.
fn city_error(err: &WeatherError, failure: &'static str) -> Response {
    if err.is_not_found() {
        error_response(StatusCode::NOT_FOUND, "City not found")
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, failure)
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/weather", get(weather_by_coords))
        .route("/weather/:city", get(current_weather))
        .route("/forecast/:city", get(forecast))
        .route("/search", get(search_cities))
        .route("/cache/stats", get(cache_stats));

    Router::new()
        .route("/", get(index))
        .route("/card/:city", get(weather_card))
        .nest("/api", api)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn current_weather(Path(city): Path<String>, State(state): State<AppState>) -> Response {
    match state.weather.get_current_weather(&city).await {
        Ok(weather) => Json(weather).into_response(),
        Err(e) => {
            warn!("❌ Weather lookup for {} failed: {}", city, e);
            city_error(&e, "Failed to fetch weather")
        }
    }
}

async fn forecast(Path(city): Path<String>, State(state): State<AppState>) -> Response {
    match state.weather.get_forecast(&city).await {
        Ok(forecast) => Json(forecast.as_slice()).into_response(),
        Err(e) => {
            warn!("❌ Forecast lookup for {} failed: {}", city, e);
            city_error(&e, "Failed to fetch forecast")
        }
    }
}

fn parse_coord(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

async fn weather_by_coords(Query(params): Query<CoordsQuery>, State(state): State<AppState>) -> Response {
    let (Some(lat), Some(lon)) = (parse_coord(params.lat.as_deref()), parse_coord(params.lon.as_deref())) else {
        warn!("❌ Invalid coordinates: lat={:?} lon={:?}", params.lat, params.lon);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch weather");
    };

    match state.weather.get_weather_by_coords(lat, lon).await {
        Ok(weather) => Json(weather).into_response(),
        Err(e) => {
            warn!("❌ Weather lookup for {}, {} failed: {}", lat, lon, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch weather")
        }
    }
}

async fn search_cities(Query(params): Query<SearchQuery>, State(state): State<AppState>) -> Response {
    match state.weather.search_cities(&params.q).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            warn!("❌ City search for {} failed: {}", params.q, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to search cities")
        }
    }
}

async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.weather.cache_stats().await;
    Json(json!({
        "cache_size": stats.entry_count,
        "ttl_seconds": stats.ttl_seconds,
        "cached_keys": stats.keys
    }))
}

async fn index(State(state): State<AppState>) -> Response {
    let city = state.default_city.to_string();
    render_card(&state, &city).await
}

async fn weather_card(Path(city): Path<String>, State(state): State<AppState>) -> Response {
    render_card(&state, &city).await
}

async fn render_card(state: &AppState, city: &str) -> Response {
    let data = async {
        let current = state.weather.get_current_weather(city).await?;
        let forecast = state.weather.get_forecast(city).await?;
        Ok::<_, WeatherError>((current, forecast))
    }
    .await;

    match data {
        Ok((current, forecast)) => render_html(StatusCode::OK, WeatherCardTemplate::new(&current, &forecast)),
        Err(WeatherError::NotFound) => render_html(
            StatusCode::NOT_FOUND,
            ErrorTemplate {
                title: "City not found".to_string(),
                message: format!("No weather data for '{}'.", city),
            },
        ),
        Err(e) => {
            warn!("❌ Weather card for {} failed: {}", city, e);
            render_html(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorTemplate {
                    title: "Weather unavailable".to_string(),
                    message: "Failed to fetch weather".to_string(),
                },
            )
        }
    }
}

fn render_html(status: StatusCode, template: impl Template) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("Template rendering error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Template error: {}", e)).into_response()
        }
    }
}
