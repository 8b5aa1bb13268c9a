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

//! Read-only airport catalog.
//!
//! Airports come from the OurAirports `airports.csv`, downloaded on first use.
//! The catalog answers two questions: which airports fall inside a bounding
//! box, and which airport carries a given ICAO/IATA code.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;
use serde::Deserialize;
use weather_layer::GeoPoint;

const AIRPORTS_URL: &str = "https://davidmegginson.github.io/ourairports-data/airports.csv";

/// Airport data from OurAirports
#[derive(Debug, Clone, Deserialize)]
pub struct Airport {
    #[serde(rename = "ident")]
    pub icao: String,

    #[serde(rename = "iata_code")]
    pub iata: Option<String>,

    #[serde(rename = "type")]
    pub airport_type: String,

    pub name: String,

    #[serde(rename = "latitude_deg")]
    pub latitude: f64,

    #[serde(rename = "longitude_deg")]
    pub longitude: f64,

    #[serde(rename = "elevation_ft")]
    pub elevation: Option<i32>,

    #[serde(default)]
    pub municipality: Option<String>,

    #[serde(rename = "scheduled_service")]
    pub scheduled_service: String,
}

impl Airport {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_major(&self) -> bool {
        self.airport_type == "large_airport"
    }

    pub fn has_scheduled_service(&self) -> bool {
        self.scheduled_service == "yes"
    }

    /// Excludes heliports, seaplane bases, balloonports, and closed airports
    pub fn is_public_airplane_airport(&self) -> bool {
        matches!(
            self.airport_type.as_str(),
            "large_airport" | "medium_airport" | "small_airport"
        )
    }
}

/// Geographic bounding box in degrees, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Square box of `radius_deg` around a point.
    pub fn around(center: GeoPoint, radius_deg: f64) -> Self {
        let radius = radius_deg.abs();
        Self {
            min_lat: center.lat - radius,
            max_lat: center.lat + radius,
            min_lon: center.lon - radius,
            max_lon: center.lon + radius,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Read-only airport lookups.
pub trait Catalog {
    fn lookup_near(&self, bbox: &BoundingBox) -> Vec<&Airport>;

    fn lookup_by_code(&self, code: &str) -> Option<&Airport>;
}

#[derive(Debug, Default)]
pub struct AirportCatalog {
    airports: Vec<Airport>,
}

impl AirportCatalog {
    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    /// Parse airports from CSV. Rows other than public airplane airports are dropped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::Reader::from_reader(reader);

        let mut airports = Vec::new();
        for result in csv_reader.deserialize() {
            let airport: Airport = result?;
            if airport.is_public_airplane_airport() {
                airports.push(airport);
            }
        }

        info!("Loaded {} airports", airports.len());
        Ok(Self { airports })
    }

    /// Load airports from CSV file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file))?)
    }

    /// Load airports.csv from a directory, downloading it if missing
    pub async fn load_or_download(data_dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir.join("airports.csv");

        if path.exists() {
            info!("airports.csv already exists, skipping download");
        } else {
            std::fs::create_dir_all(data_dir)?;
            info!("Downloading airports.csv from {AIRPORTS_URL}...");

            let response = reqwest::get(AIRPORTS_URL).await?.error_for_status()?;
            let bytes = response.bytes().await?;
            std::fs::write(&path, &bytes)?;
            info!("Downloaded airports.csv ({} bytes)", bytes.len());
        }

        Self::load(&path)
    }
}

impl Catalog for AirportCatalog {
    fn lookup_near(&self, bbox: &BoundingBox) -> Vec<&Airport> {
        self.airports
            .iter()
            .filter(|a| bbox.contains(a.latitude, a.longitude))
            .collect()
    }

    fn lookup_by_code(&self, code: &str) -> Option<&Airport> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        self.airports.iter().find(|a| {
            a.icao.eq_ignore_ascii_case(code)
                || a.iata.as_deref().is_some_and(|iata| iata.eq_ignore_ascii_case(code))
        })
    }
}
