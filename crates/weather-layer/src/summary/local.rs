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

//! Deterministic, offline summary provider.

use async_trait::async_trait;

use super::{ProviderError, SummaryProvider};
use crate::fetch::{ConditionsSnapshot, WeatherPayload};

const COMPASS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Rule-based summaries built purely from the payload fields.
///
/// Always succeeds with non-empty text; it terminates every provider chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProvider;

#[allow(
    clippy::cast_possible_truncation,
    reason = "display temperatures fit in i64"
)]
fn whole(value: f64) -> i64 {
    value.round() as i64
}

fn temperature_band(celsius: f64) -> &'static str {
    match celsius {
        t if t < -10.0 => "bitterly cold",
        t if t < 0.0 => "freezing",
        t if t < 10.0 => "cold",
        t if t < 16.0 => "cool",
        t if t < 22.0 => "mild",
        t if t < 28.0 => "warm",
        t if t < 35.0 => "hot",
        _ => "extremely hot",
    }
}

fn humidity_phrase(humidity: u8) -> String {
    match humidity {
        0..=29 => format!("The air is dry at {humidity}% humidity"),
        30..=59 => format!("Humidity is comfortable at {humidity}%"),
        60..=79 => format!("It feels humid at {humidity}%"),
        _ => format!("Conditions are very humid at {humidity}%"),
    }
}

fn compass_point(deg: u16) -> &'static str {
    COMPASS[((usize::from(deg % 360) * 2 + 45) / 90) % 8]
}

fn wind_phrase(speed: f64, deg: u16) -> String {
    let strength = match speed {
        s if s < 1.5 => return "with calm winds".to_string(),
        s if s < 5.5 => "a light breeze",
        s if s < 10.8 => "a moderate wind",
        s if s < 17.2 => "a strong wind",
        _ => "gale-force winds",
    };
    format!("with {strength} from the {}", compass_point(deg))
}

fn pressure_phrase(pressure: u32) -> String {
    match pressure {
        0..=999 => format!("Low pressure ({pressure} hPa) points to unsettled weather."),
        1000..=1020 => format!("Pressure is steady at {pressure} hPa."),
        _ => format!("High pressure ({pressure} hPa) should keep things settled."),
    }
}

fn forecast_phrase(current: &ConditionsSnapshot, forecast: &[ConditionsSnapshot]) -> Option<String> {
    let next = forecast.first()?;
    let delta = next.temperature - current.temperature;
    let target = whole(next.temperature);

    let trend = if delta >= 3.0 {
        format!("Warming towards {target}°C ahead")
    } else if delta <= -3.0 {
        format!("Cooling to {target}°C ahead")
    } else {
        format!("Temperatures hold near {target}°C ahead")
    };

    let wet = forecast.iter().find(|f| {
        let c = f.condition.to_lowercase();
        c.contains("rain") || c.contains("snow") || c.contains("storm") || c.contains("drizzle")
    });

    Some(match wet {
        Some(f) => format!("{trend}, with {} expected.", f.condition.to_lowercase()),
        None => format!("{trend}."),
    })
}

impl LocalProvider {
    /// Build the summary text. Infallible.
    pub fn describe(&self, payload: &WeatherPayload) -> String {
        let current = &payload.current;
        let place = match payload.location_name().trim() {
            "" => "Right now".to_string(),
            name => name.to_string(),
        };
        let condition = match current.condition.trim() {
            "" => "Conditions are unclear".to_string(),
            c => capitalize(c),
        };

        let mut sentences = vec![
            format!(
                "{place}: {condition} and {} at {}°C (feels like {}°C).",
                temperature_band(current.temperature),
                whole(current.temperature),
                whole(current.feels_like)
            ),
            format!(
                "{} {}.",
                humidity_phrase(current.humidity),
                wind_phrase(current.wind_speed, current.wind_deg)
            ),
            pressure_phrase(current.pressure),
        ];

        if let Some(phrase) = forecast_phrase(current, &payload.forecast) {
            sentences.push(phrase);
        }
        if let Some(aq) = &payload.air_quality {
            sentences.push(format!("Air quality is {}.", aq.label()));
        }

        sentences.join(" ")
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl SummaryProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate(&self, payload: &WeatherPayload) -> Result<String, ProviderError> {
        Ok(self.describe(payload))
    }
}
