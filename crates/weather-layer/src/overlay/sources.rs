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

//! Imagery source descriptors and their resolution from layer ids.
//!
//! Weather overlays come from the OpenWeatherMap tile service (static
//! endpoints) or the NASA GIBS satellite archive (endpoints addressed by
//! calendar date). Base layers come from Carto and OpenStreetMap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use walkers::sources::{Attribution, TileSource};
use walkers::TileId;

use super::OverlayError;

/// Weather overlay layers served by the OpenWeatherMap tile service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherLayer {
    Temperature,
    Wind,
    Precipitation,
    Clouds,
    Pressure,
}

impl WeatherLayer {
    pub const ALL: [WeatherLayer; 5] = [
        WeatherLayer::Temperature,
        WeatherLayer::Wind,
        WeatherLayer::Precipitation,
        WeatherLayer::Clouds,
        WeatherLayer::Pressure,
    ];

    /// Layer id used in overlay selections.
    pub fn id(&self) -> &'static str {
        match self {
            WeatherLayer::Temperature => "temperature",
            WeatherLayer::Wind => "wind",
            WeatherLayer::Precipitation => "precipitation",
            WeatherLayer::Clouds => "clouds",
            WeatherLayer::Pressure => "pressure",
        }
    }

    /// Get the OpenWeatherMap layer name for URL construction
    pub fn as_str(&self) -> &'static str {
        match self {
            WeatherLayer::Temperature => "temp_new",
            WeatherLayer::Wind => "wind_new",
            WeatherLayer::Precipitation => "precipitation_new",
            WeatherLayer::Clouds => "clouds_new",
            WeatherLayer::Pressure => "pressure_new",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WeatherLayer::Temperature => "Temperature",
            WeatherLayer::Wind => "Wind",
            WeatherLayer::Precipitation => "Precipitation",
            WeatherLayer::Clouds => "Clouds",
            WeatherLayer::Pressure => "Pressure",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.id() == id)
    }
}

/// Day-granular imagery layers from the NASA GIBS archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatelliteLayer {
    TrueColor,
    ViirsTrueColor,
    SnowCover,
}

impl SatelliteLayer {
    pub const ALL: [SatelliteLayer; 3] = [
        SatelliteLayer::TrueColor,
        SatelliteLayer::ViirsTrueColor,
        SatelliteLayer::SnowCover,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SatelliteLayer::TrueColor => "satellite",
            SatelliteLayer::ViirsTrueColor => "satellite_viirs",
            SatelliteLayer::SnowCover => "snow_cover",
        }
    }

    /// GIBS product identifier.
    pub fn product(&self) -> &'static str {
        match self {
            SatelliteLayer::TrueColor => "MODIS_Terra_CorrectedReflectance_TrueColor",
            SatelliteLayer::ViirsTrueColor => "VIIRS_SNPP_CorrectedReflectance_TrueColor",
            SatelliteLayer::SnowCover => "MODIS_Terra_NDSI_Snow_Cover",
        }
    }

    fn max_level(self) -> u8 {
        match self {
            SatelliteLayer::SnowCover => 8,
            SatelliteLayer::TrueColor | SatelliteLayer::ViirsTrueColor => 9,
        }
    }

    fn format(self) -> &'static str {
        match self {
            SatelliteLayer::SnowCover => "png",
            SatelliteLayer::TrueColor | SatelliteLayer::ViirsTrueColor => "jpg",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.id() == id)
    }
}

/// Base map styles. Switching between them clears every imagery source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basemap {
    #[default]
    Dark,
    Light,
    Streets,
}

impl Basemap {
    pub fn id(&self) -> &'static str {
        match self {
            Basemap::Dark => "dark",
            Basemap::Light => "light",
            Basemap::Streets => "streets",
        }
    }
}

/// Where the tiles of one imagery source come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Base map tiles.
    Basemap(Basemap),
    /// Static weather tiles; never rebuilt for a date change.
    Tile { layer: WeatherLayer, api_key: String },
    /// Satellite tiles for one calendar day.
    Archive { layer: SatelliteLayer, date: NaiveDate },
}

impl SourceDescriptor {
    /// Whether the endpoint depends on the reference date.
    pub fn is_date_sensitive(&self) -> bool {
        matches!(self, SourceDescriptor::Archive { .. })
    }

    /// Endpoint template with `{z}`, `{x}`, `{y}` (and `{s}` for subdomains).
    pub fn url_template(&self) -> String {
        match self {
            SourceDescriptor::Basemap(Basemap::Dark) => {
                "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}.png".to_string()
            }
            SourceDescriptor::Basemap(Basemap::Light) => {
                "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png".to_string()
            }
            SourceDescriptor::Basemap(Basemap::Streets) => {
                "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
            }
            SourceDescriptor::Tile { layer, api_key } => format!(
                "https://tile.openweathermap.org/map/{}/{{z}}/{{x}}/{{y}}.png?appid={api_key}",
                layer.as_str()
            ),
            SourceDescriptor::Archive { layer, date } => format!(
                "https://gibs.earthdata.nasa.gov/wmts/epsg3857/best/{}/default/{}/GoogleMapsCompatible_Level{}/{{z}}/{{y}}/{{x}}.{}",
                layer.product(),
                date.format("%Y-%m-%d"),
                layer.max_level(),
                layer.format()
            ),
        }
    }
}

impl TileSource for SourceDescriptor {
    fn tile_url(&self, tile_id: TileId) -> String {
        // Subdomain load balancing (a, b, c, d) based on tile coordinates
        let subdomain = ['a', 'b', 'c', 'd'][((tile_id.x + tile_id.y) % 4) as usize];

        self.url_template()
            .replace("{s}", &subdomain.to_string())
            .replace("{z}", &tile_id.zoom.to_string())
            .replace("{x}", &tile_id.x.to_string())
            .replace("{y}", &tile_id.y.to_string())
    }

    fn attribution(&self) -> Attribution {
        let (text, url) = match self {
            SourceDescriptor::Basemap(Basemap::Dark | Basemap::Light) => {
                ("© OpenStreetMap contributors, © CARTO", "https://carto.com/attributions")
            }
            SourceDescriptor::Basemap(Basemap::Streets) => {
                ("© OpenStreetMap contributors", "https://www.openstreetmap.org/copyright")
            }
            SourceDescriptor::Tile { .. } => ("Weather data © OpenWeatherMap", "https://openweathermap.org/"),
            SourceDescriptor::Archive { .. } => (
                "Imagery courtesy of NASA EOSDIS GIBS",
                "https://earthdata.nasa.gov/gibs",
            ),
        };

        Attribution {
            text,
            url,
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        match self {
            SourceDescriptor::Archive { layer, .. } => layer.max_level(),
            _ => 19,
        }
    }
}

/// Maps layer ids to source descriptors.
#[derive(Clone, Default)]
pub struct SourceResolver {
    tile_api_key: Option<String>,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("has_tile_api_key", &self.tile_api_key.is_some())
            .finish()
    }
}

impl SourceResolver {
    #[must_use]
    pub fn new(tile_api_key: Option<String>) -> Self {
        Self {
            tile_api_key: tile_api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Every layer id this resolver knows about.
    pub fn known_ids() -> Vec<&'static str> {
        WeatherLayer::ALL
            .iter()
            .map(WeatherLayer::id)
            .chain(SatelliteLayer::ALL.iter().map(SatelliteLayer::id))
            .collect()
    }

    /// Resolve the source for a layer id on a reference date.
    pub fn resolve(&self, id: &str, date: NaiveDate) -> Result<SourceDescriptor, OverlayError> {
        if let Some(layer) = WeatherLayer::from_id(id) {
            let api_key = self
                .tile_api_key
                .clone()
                .ok_or_else(|| OverlayError::MissingApiKey(id.to_string()))?;
            return Ok(SourceDescriptor::Tile { layer, api_key });
        }

        if let Some(layer) = SatelliteLayer::from_id(id) {
            return Ok(SourceDescriptor::Archive { layer, date });
        }

        Err(OverlayError::UnknownLayer(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    #[test]
    fn test_resolve_tile_layer() {
        let resolver = SourceResolver::new(Some("KEY".into()));
        let source = resolver.resolve("wind", date()).unwrap();
        assert!(!source.is_date_sensitive());
        assert_eq!(
            source.url_template(),
            "https://tile.openweathermap.org/map/wind_new/{z}/{x}/{y}.png?appid=KEY"
        );
    }

    #[test]
    fn test_resolve_archive_layer() {
        let source = SourceResolver::new(None).resolve("satellite", date()).unwrap();
        assert!(source.is_date_sensitive());
        assert_eq!(
            source.tile_url(TileId { x: 3, y: 5, zoom: 4 }),
            "https://gibs.earthdata.nasa.gov/wmts/epsg3857/best/MODIS_Terra_CorrectedReflectance_TrueColor/default/2024-06-10/GoogleMapsCompatible_Level9/4/5/3.jpg"
        );
        assert_eq!(source.max_zoom(), 9);
    }

    #[test]
    fn test_resolve_failures() {
        let resolver = SourceResolver::new(None);
        assert_eq!(
            resolver.resolve("temperature", date()),
            Err(OverlayError::MissingApiKey("temperature".into()))
        );
        assert_eq!(
            resolver.resolve("lightning", date()),
            Err(OverlayError::UnknownLayer("lightning".into()))
        );
    }

    #[test]
    fn test_basemap_subdomain_balancing() {
        let source = SourceDescriptor::Basemap(Basemap::Dark);
        assert_eq!(
            source.tile_url(TileId { x: 1, y: 2, zoom: 7 }),
            "https://d.basemaps.cartocdn.com/dark_all/7/1/2.png"
        );
        assert_eq!(source.attribution().text, "© OpenStreetMap contributors, © CARTO");
    }

    #[test]
    fn test_known_ids() {
        let ids = SourceResolver::known_ids();
        assert_eq!(ids.len(), 8);
        assert!(ids.contains(&"clouds"));
        assert!(ids.contains(&"snow_cover"));
    }
}
