// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! OpenWeatherMap REST client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{AirQualitySnapshot, ConditionsSnapshot, FetchError, WeatherSource};
use crate::cache::GeoPoint;

const PROVIDER: &str = "OpenWeatherMap";
const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// The 5-day forecast is 3-hourly; keep one sample per day.
const FORECAST_STRIDE: usize = 8;
const FORECAST_DAYS: usize = 5;

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    feels_like: f64,
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: u16,
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    weather: Vec<OwmCondition>,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    dt: i64,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    main: OwmMain,
    weather: Vec<OwmCondition>,
    #[serde(default)]
    wind: OwmWind,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmPollutionMain {
    aqi: u8,
}

#[derive(Debug, Default, Deserialize)]
struct OwmComponents {
    #[serde(default)]
    pm2_5: f64,
    #[serde(default)]
    pm10: f64,
    #[serde(default)]
    o3: f64,
    #[serde(default)]
    no2: f64,
}

#[derive(Debug, Deserialize)]
struct OwmPollutionItem {
    main: OwmPollutionMain,
    #[serde(default)]
    components: OwmComponents,
}

#[derive(Debug, Deserialize)]
struct OwmPollution {
    list: Vec<OwmPollutionItem>,
}

#[derive(Debug, Deserialize)]
struct OwmErrorBody {
    message: Option<String>,
}

fn snapshot(
    main: OwmMain,
    wind: OwmWind,
    weather: Vec<OwmCondition>,
    dt: i64,
    location: Option<String>,
) -> ConditionsSnapshot {
    let (condition, icon) = weather
        .into_iter()
        .next()
        .map(|w| (w.description, w.icon))
        .unwrap_or_default();

    ConditionsSnapshot {
        temperature: main.temp,
        feels_like: main.feels_like,
        humidity: main.humidity,
        pressure: main.pressure,
        wind_speed: wind.speed,
        wind_deg: wind.deg,
        condition,
        icon,
        observed_at: DateTime::<Utc>::from_timestamp(dt, 0),
        location,
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode {
        provider: PROVIDER,
        detail: e.to_string(),
    })
}

fn parse_current(body: &str) -> Result<ConditionsSnapshot, FetchError> {
    let current: OwmCurrent = decode(body)?;
    let location = Some(current.name).filter(|n| !n.is_empty());
    Ok(snapshot(current.main, current.wind, current.weather, current.dt, location))
}

fn parse_forecast(body: &str) -> Result<Vec<ConditionsSnapshot>, FetchError> {
    let forecast: OwmForecast = decode(body)?;
    Ok(forecast
        .list
        .into_iter()
        .step_by(FORECAST_STRIDE)
        .take(FORECAST_DAYS)
        .map(|item| snapshot(item.main, item.wind, item.weather, item.dt, None))
        .collect())
}

fn parse_air_quality(body: &str) -> Result<Option<AirQualitySnapshot>, FetchError> {
    let pollution: OwmPollution = decode(body)?;
    Ok(pollution.list.into_iter().next().map(|item| AirQualitySnapshot {
        aqi: item.main.aqi,
        pm2_5: item.components.pm2_5,
        pm10: item.components.pm10,
        o3: item.components.o3,
        no2: item.components.no2,
    }))
}

/// Weather source backed by the OpenWeatherMap data API (metric units).
#[derive(Debug, Clone)]
pub struct OpenWeatherMapClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenWeatherMapClient {
    /// Create a client. Without a key every request fails with
    /// [`FetchError::MissingApiKey`] and nothing is sent.
    pub fn new(api_key: Option<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get(&self, endpoint: &str, point: GeoPoint) -> Result<String, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey(PROVIDER))?;
        let url = format!("{}/{endpoint}", self.base_url);

        debug!("GET {url} lat={} lon={}", point.lat, point.lon);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", point.lat.to_string()),
                ("lon", point.lon.to_string()),
                ("units", "metric".to_string()),
                ("appid", api_key.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OwmErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            return Err(FetchError::from_status(PROVIDER, status.as_u16(), message));
        }

        Ok(body)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherMapClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn current(&self, point: GeoPoint) -> Result<ConditionsSnapshot, FetchError> {
        parse_current(&self.get("weather", point).await?)
    }

    async fn forecast(&self, point: GeoPoint) -> Result<Vec<ConditionsSnapshot>, FetchError> {
        parse_forecast(&self.get("forecast", point).await?)
    }

    async fn air_quality(&self, point: GeoPoint) -> Result<Option<AirQualitySnapshot>, FetchError> {
        parse_air_quality(&self.get("air_pollution", point).await?)
    }
}
