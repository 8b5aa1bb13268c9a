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

//! Application configuration management.
//!
//! Configuration is persisted as TOML through confy. API keys may live here
//! but environment variables always take precedence (see
//! [`weather_layer::keys`]). Version 1 configs stored one boolean per weather
//! layer; they are migrated to the overlay list on load.

use std::path::PathBuf;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use weather_layer::keys::{resolve_key, KeySource, ANTHROPIC_KEY_VAR, OPENAI_KEY_VAR, OPENWEATHERMAP_KEY_VAR};
use weather_layer::{Basemap, GeoPoint, ServiceKeys};

const APP_NAME: &str = "weatherdeck";
const CONFIG_NAME: &str = "config";
const CURRENT_VERSION: u32 = 2;

/// Version 1 layout, kept only for migration
#[derive(Debug, Default, Serialize, Deserialize)]
struct LegacyAppConfig {
    show_weather_precipitation: Option<bool>,
    show_weather_clouds: Option<bool>,
    show_weather_wind: Option<bool>,
    override_gps_latitude: Option<f64>,
    override_gps_longitude: Option<f64>,
    openweathermap_api_key: Option<String>,
}

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default)]
    pub config_version: u32,

    /// OpenWeatherMap API key (optional, env var takes precedence)
    #[serde(default)]
    pub openweathermap_api_key: Option<String>,

    /// Anthropic API key for AI summaries (optional, env var takes precedence)
    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// OpenAI API key for AI summaries (optional, env var takes precedence)
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Location used when none is given and IP lookup is not requested
    #[serde(default)]
    pub default_latitude: Option<f64>,

    #[serde(default)]
    pub default_longitude: Option<f64>,

    #[serde(default)]
    pub default_basemap: Basemap,

    /// Overlay ids switched on at start-up
    #[serde(default)]
    pub default_overlays: Vec<String>,

    /// Minutes between background cache sweeps
    #[serde(default = "default_sweep_interval_minutes")]
    pub sweep_interval_minutes: u64,

    /// Use LLM providers for summaries; the local summary is always available
    #[serde(default = "default_true")]
    pub ai_summaries: bool,

    /// Directory holding airports.csv (defaults to the user data dir)
    #[serde(default)]
    pub airport_data_dir: Option<PathBuf>,
}

fn default_sweep_interval_minutes() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            openweathermap_api_key: None,
            anthropic_api_key: None,
            openai_api_key: None,
            default_latitude: None,
            default_longitude: None,
            default_basemap: Basemap::default(),
            default_overlays: Vec::new(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
            ai_summaries: true,
            airport_data_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, migrating version 1 files
    pub fn load() -> Result<Self, confy::ConfyError> {
        let config: AppConfig = confy::load(APP_NAME, CONFIG_NAME)?;

        if config.config_version < CURRENT_VERSION {
            let legacy: LegacyAppConfig = confy::load(APP_NAME, CONFIG_NAME)?;
            info!("Migrating configuration from version {}", config.config_version);
            let migrated = Self::migrate_from_legacy(legacy);
            migrated.save()?;
            return Ok(migrated);
        }

        Ok(config)
    }

    fn migrate_from_legacy(legacy: LegacyAppConfig) -> Self {
        let default_overlays = [
            ("precipitation", legacy.show_weather_precipitation),
            ("clouds", legacy.show_weather_clouds),
            ("wind", legacy.show_weather_wind),
        ]
        .into_iter()
        .filter(|(_, shown)| shown.unwrap_or(false))
        .map(|(id, _)| id.to_string())
        .collect();

        Self {
            openweathermap_api_key: legacy.openweathermap_api_key,
            default_latitude: legacy.override_gps_latitude,
            default_longitude: legacy.override_gps_longitude,
            default_overlays,
            ..Self::default()
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn default_location(&self) -> Option<GeoPoint> {
        match (self.default_latitude, self.default_longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes.max(1) * 60)
    }

    /// Resolve every provider key. LLM keys are dropped when AI summaries are off.
    pub fn service_keys(&self) -> ServiceKeys {
        let mut keys = ServiceKeys::resolve(
            self.openweathermap_api_key.as_deref(),
            self.anthropic_api_key.as_deref(),
            self.openai_api_key.as_deref(),
        );
        if !self.ai_summaries {
            keys.anthropic = None;
            keys.openai = None;
        }
        keys
    }

    /// Where each key comes from, for display
    pub fn key_sources(&self) -> Vec<(&'static str, Option<KeySource>)> {
        [
            (OPENWEATHERMAP_KEY_VAR, self.openweathermap_api_key.as_deref()),
            (ANTHROPIC_KEY_VAR, self.anthropic_api_key.as_deref()),
            (OPENAI_KEY_VAR, self.openai_api_key.as_deref()),
        ]
        .into_iter()
        .map(|(var, config_key)| (var, resolve_key(var, config_key).map(|(_, source)| source)))
        .collect()
    }

    /// Directory holding the airport CSV
    pub fn airport_dir(&self) -> PathBuf {
        self.airport_data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".data"))
                .join(APP_NAME)
                .join("airports")
        })
    }
}
