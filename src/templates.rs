use askama::Template;
use chrono::DateTime;

use crate::weather::{CurrentWeather, ForecastItem};

const CHART_WIDTH: f64 = 320.0;
const CHART_HEIGHT: f64 = 80.0;
const CHART_PADDING: f64 = 8.0;
const HOURLY_STEPS: usize = 8;
const DAILY_STRIDE: usize = 8;
const DAILY_DAYS: usize = 5;

pub struct Stat {
    pub label: &'static str,
    pub value: String,
}

pub struct HourlyPoint {
    pub time: String,
    pub temp: i64,
    pub x: String,
    pub y: String,
}

pub struct DailyRow {
    pub day: String,
    pub icon: String,
    pub description: String,
    pub precipitation: i64,
    pub temp: i64,
}

#[derive(Template)]
#[template(path = "weather_card.html")]
pub struct WeatherCardTemplate {
    pub city: String,
    pub country: String,
    pub description: String,
    pub icon: String,
    pub theme: &'static str,
    pub temp: i64,
    pub feels_like: i64,
    pub temp_max: i64,
    pub temp_min: i64,
    pub stats: Vec<Stat>,
    pub hourly: Vec<HourlyPoint>,
    pub hourly_line: String,
    pub chart_width: f64,
    pub chart_height: f64,
    pub daily: Vec<DailyRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub title: String,
    pub message: String,
}

/// Background theme for the card, keyed off the OpenWeatherMap icon code.
pub fn theme_for_icon(icon: &str) -> &'static str {
    if icon.contains("01") {
        "clear"
    } else if ["02", "03", "04"].iter().any(|code| icon.contains(code)) {
        "cloudy"
    } else if icon.contains("09") || icon.contains("10") {
        "rain"
    } else if icon.contains("11") {
        "storm"
    } else if icon.contains("13") {
        "snow"
    } else {
        "warm"
    }
}

fn format_ts(ts: i64, fmt: &str) -> String {
    DateTime::from_timestamp(ts, 0)
        .unwrap_or_default()
        .format(fmt)
        .to_string()
}

fn round(value: f64) -> i64 {
    value.round() as i64
}

fn chart_points(temps: &[f64]) -> Vec<(f64, f64)> {
    let min = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let step = if temps.len() > 1 {
        (CHART_WIDTH - 2.0 * CHART_PADDING) / (temps.len() - 1) as f64
    } else {
        0.0
    };

    temps
        .iter()
        .enumerate()
        .map(|(i, temp)| {
            let x = CHART_PADDING + i as f64 * step;
            let y = CHART_HEIGHT - CHART_PADDING - (temp - min) / span * (CHART_HEIGHT - 2.0 * CHART_PADDING);
            (x, y)
        })
        .collect()
}

impl WeatherCardTemplate {
    pub fn new(current: &CurrentWeather, forecast: &[ForecastItem]) -> Self {
        let stats = vec![
            Stat { label: "Humidity", value: format!("{}%", current.humidity) },
            Stat { label: "Wind", value: format!("{} m/s", current.wind_speed) },
            Stat {
                label: "Visibility",
                value: format!("{:.1} km", current.visibility as f64 / 1000.0),
            },
            Stat { label: "Pressure", value: format!("{} hPa", current.pressure) },
            Stat { label: "Sunrise", value: format_ts(current.sunrise, "%H:%M") },
            Stat { label: "Sunset", value: format_ts(current.sunset, "%H:%M") },
        ];

        let hourly_items: Vec<&ForecastItem> = forecast.iter().take(HOURLY_STEPS).collect();
        let temps: Vec<f64> = hourly_items.iter().map(|item| item.temp.round()).collect();
        let points = chart_points(&temps);

        let hourly: Vec<HourlyPoint> = hourly_items
            .iter()
            .zip(points.iter())
            .map(|(item, (x, y))| HourlyPoint {
                time: format_ts(item.dt, "%H:%M"),
                temp: round(item.temp),
                x: format!("{:.1}", x),
                y: format!("{:.1}", y),
            })
            .collect();

        let hourly_line = hourly
            .iter()
            .map(|point| format!("{},{}", point.x, point.y))
            .collect::<Vec<_>>()
            .join(" ");

        let daily = forecast
            .iter()
            .step_by(DAILY_STRIDE)
            .take(DAILY_DAYS)
            .map(|item| DailyRow {
                day: format_ts(item.dt, "%a"),
                icon: item.icon.clone(),
                description: item.description.clone(),
                precipitation: round(item.precipitation * 100.0),
                temp: round(item.temp),
            })
            .collect();

        Self {
            city: current.city.clone(),
            country: current.country.clone(),
            description: current.description.clone(),
            icon: current.icon.clone(),
            theme: theme_for_icon(&current.icon),
            temp: round(current.temp),
            feels_like: round(current.feels_like),
            temp_max: round(current.temp_max),
            temp_min: round(current.temp_min),
            stats,
            hourly,
            hourly_line,
            chart_width: CHART_WIDTH,
            chart_height: CHART_HEIGHT,
            daily,
        }
    }
}
