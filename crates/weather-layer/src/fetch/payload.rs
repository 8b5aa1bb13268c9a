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

//! Normalized weather payload types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One observation or forecast sample, in metric units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionsSnapshot {
    /// Air temperature in °C.
    pub temperature: f64,
    /// Perceived ("feels like") temperature in °C.
    pub feels_like: f64,
    /// Relative humidity in percent.
    pub humidity: u8,
    /// Sea-level pressure in hPa.
    pub pressure: u32,
    /// Wind speed in m/s.
    pub wind_speed: f64,
    /// Wind direction in degrees (meteorological, 0 = north).
    pub wind_deg: u16,
    /// Condition text, e.g. "clear sky".
    pub condition: String,
    /// Provider icon id, e.g. "01d".
    pub icon: String,
    /// Observation or forecast time.
    pub observed_at: Option<DateTime<Utc>>,
    /// Display name of the location (current conditions only).
    pub location: Option<String>,
}

/// Air quality at the observed location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirQualitySnapshot {
    /// Air quality index, 1 (good) to 5 (very poor).
    pub aqi: u8,
    pub pm2_5: f64,
    pub pm10: f64,
    pub o3: f64,
    pub no2: f64,
}

impl AirQualitySnapshot {
    pub fn label(&self) -> &'static str {
        match self.aqi {
            1 => "good",
            2 => "fair",
            3 => "moderate",
            4 => "poor",
            _ => "very poor",
        }
    }
}

/// Everything fetched for one coordinate. Never mutated after assembly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherPayload {
    pub current: ConditionsSnapshot,
    pub forecast: Vec<ConditionsSnapshot>,
    pub air_quality: Option<AirQualitySnapshot>,
}

impl WeatherPayload {
    /// Location name of the current conditions, or an empty string.
    pub fn location_name(&self) -> &str {
        self.current.location.as_deref().unwrap_or("")
    }
}
