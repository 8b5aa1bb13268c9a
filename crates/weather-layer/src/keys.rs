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

//! Provider credentials resolved once at start-up.

/// Environment variable for the OpenWeatherMap key (data API and tiles).
pub const OPENWEATHERMAP_KEY_VAR: &str = "OPENWEATHERMAP_API_KEY";
/// Environment variable for summary provider A.
pub const ANTHROPIC_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// Environment variable for summary provider B.
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Where a resolved key came from, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    ConfigFile,
}

impl KeySource {
    pub fn describe(self) -> &'static str {
        match self {
            KeySource::Environment => "environment variable",
            KeySource::ConfigFile => "config file",
        }
    }
}

/// API keys for every external provider. Absent keys disable the provider.
///
/// Built once and treated as immutable for the lifetime of the process.
#[derive(Clone, Default)]
pub struct ServiceKeys {
    pub openweathermap: Option<String>,
    pub anthropic: Option<String>,
    pub openai: Option<String>,
}

impl std::fmt::Debug for ServiceKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceKeys")
            .field("openweathermap", &self.openweathermap.is_some())
            .field("anthropic", &self.anthropic.is_some())
            .field("openai", &self.openai.is_some())
            .finish()
    }
}

impl ServiceKeys {
    /// Resolve every key, environment first, then the config values.
    pub fn resolve(
        openweathermap: Option<&str>,
        anthropic: Option<&str>,
        openai: Option<&str>,
    ) -> Self {
        Self {
            openweathermap: resolve_key(OPENWEATHERMAP_KEY_VAR, openweathermap).map(|(k, _)| k),
            anthropic: resolve_key(ANTHROPIC_KEY_VAR, anthropic).map(|(k, _)| k),
            openai: resolve_key(OPENAI_KEY_VAR, openai).map(|(k, _)| k),
        }
    }
}

/// Resolve one API key from an environment variable or a config value.
///
/// Empty strings count as absent in both places.
pub fn resolve_key(var: &str, config_key: Option<&str>) -> Option<(String, KeySource)> {
    if let Ok(key) = std::env::var(var) {
        if !key.is_empty() {
            return Some((key, KeySource::Environment));
        }
    }

    config_key
        .filter(|s| !s.is_empty())
        .map(|s| (s.to_string(), KeySource::ConfigFile))
}
