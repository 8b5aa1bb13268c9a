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

//! Cache keys: quantized coordinates and conditions fingerprints.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Decimal places kept when quantizing a coordinate (about 11 m).
const COORDINATE_PRECISION: i32 = 4;

/// A raw geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn key(&self) -> CoordinateKey {
        CoordinateKey::from_point(*self)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// A coordinate quantized to 4 decimal places.
///
/// Stored as scaled integers so that equality and hashing are exact; two raw
/// coordinates that round to the same value are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateKey {
    lat_e4: i64,
    lon_e4: i64,
}

impl CoordinateKey {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat_e4: quantize(lat),
            lon_e4: quantize(lon),
        }
    }

    #[must_use]
    pub fn from_point(point: GeoPoint) -> Self {
        Self::new(point.lat, point.lon)
    }

    pub fn lat(&self) -> f64 {
        dequantize(self.lat_e4)
    }

    pub fn lon(&self) -> f64 {
        dequantize(self.lon_e4)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "degrees scaled by 10^4 stay far inside i64"
)]
fn quantize(degrees: f64) -> i64 {
    (degrees * 10f64.powi(COORDINATE_PRECISION)).round() as i64
}

#[allow(
    clippy::cast_precision_loss,
    reason = "scaled degrees are below 2^53"
)]
fn dequantize(scaled: i64) -> f64 {
    scaled as f64 / 10f64.powi(COORDINATE_PRECISION)
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat(), self.lon())
    }
}

/// Fingerprint of the conditions a summary describes.
///
/// Location and condition text are trimmed and lowercased, temperature is
/// rounded to a whole degree, then the normalized text is hashed with SHA-256.
pub fn conditions_fingerprint(location: &str, temperature: f64, condition: &str) -> String {
    let normalized = format!(
        "{}|{}|{}",
        location.trim().to_lowercase(),
        round_temperature(temperature),
        condition.trim().to_lowercase()
    );

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "surface temperatures fit in i64"
)]
fn round_temperature(temperature: f64) -> i64 {
    temperature.round() as i64
}
