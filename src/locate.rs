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

//! IP-based geolocation, used when no surface can report a position.

use std::time::Duration;

use log::{info, warn};
use serde_json::Value;
use weather_layer::GeoPoint;

/// (url, latitude field, longitude field), tried in order
const PROVIDERS: [(&str, &str, &str); 2] = [
    ("https://ipapi.co/json/", "latitude", "longitude"),
    // ip-api.com needs no key but only serves plain HTTP on the free tier
    ("http://ip-api.com/json/", "lat", "lon"),
];

fn parse_location(body: &Value, lat_field: &str, lon_field: &str) -> Option<GeoPoint> {
    let lat = body.get(lat_field).and_then(Value::as_f64)?;
    let lon = body.get(lon_field).and_then(Value::as_f64)?;
    Some(GeoPoint::new(lat, lon))
}

/// Approximate the current location from the public IP address.
pub async fn current_location() -> Option<GeoPoint> {
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(5)).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Cannot build geolocation client: {e}");
            return None;
        }
    };

    for (url, lat_field, lon_field) in PROVIDERS {
        let body: Value = match client.get(url).send().await {
            Ok(response) => match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Unreadable geolocation response from {url}: {e}");
                    continue;
                }
            },
            Err(e) => {
                warn!("Geolocation via {url} failed: {e}");
                continue;
            }
        };

        if let Some(point) = parse_location(&body, lat_field, lon_field) {
            info!("Location found via {url}: {point}");
            return Some(point);
        }
    }

    warn!("Failed to fetch location from all sources");
    None
}
