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

//! Weather data fetching with write-through caching.
//!
//! A fetch for a coordinate issues three independent requests (current
//! conditions, forecast, air quality) concurrently and succeeds only if all
//! three do. Successful payloads are cached per quantized coordinate; failed
//! fetches leave the cache untouched and are never retried automatically.

mod openweathermap;
mod payload;

pub use openweathermap::OpenWeatherMapClient;
pub use payload::{AirQualitySnapshot, ConditionsSnapshot, WeatherPayload};

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;

use crate::cache::{CoordinateKey, GeoPoint, TtlCache};

/// Weather payload namespace of the cache store.
pub type WeatherCache = TtlCache<CoordinateKey, Arc<WeatherPayload>>;

/// A failed weather fetch. User-visible and retryable by fetching again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Provider answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// Response body could not be decoded.
    #[error("invalid response from {provider}: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

impl FetchError {
    /// Build a status failure, preferring the provider's own message.
    pub fn from_status(provider: &str, status: u16, message: Option<String>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("{provider} error {status}"));
        Self::Status { status, message }
    }
}

/// External provider of current conditions, forecast and air quality.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Provider name used in logs and error messages.
    fn name(&self) -> &'static str;

    async fn current(&self, point: GeoPoint) -> Result<ConditionsSnapshot, FetchError>;

    async fn forecast(&self, point: GeoPoint) -> Result<Vec<ConditionsSnapshot>, FetchError>;

    async fn air_quality(&self, point: GeoPoint) -> Result<Option<AirQualitySnapshot>, FetchError>;
}

/// Fetches weather payloads through the weather cache.
pub struct WeatherFetcher {
    source: Arc<dyn WeatherSource>,
    cache: Arc<WeatherCache>,
}

impl std::fmt::Debug for WeatherFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherFetcher")
            .field("source", &self.source.name())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl WeatherFetcher {
    #[must_use]
    pub fn new(source: Arc<dyn WeatherSource>, cache: Arc<WeatherCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<WeatherCache> {
        &self.cache
    }

    /// Cached payload for the point's key, without touching the network.
    pub fn cached(&self, point: GeoPoint) -> Option<Arc<WeatherPayload>> {
        self.cache.get(&point.key())
    }

    /// Fetch the payload for a coordinate.
    ///
    /// On a cache hit no request is made. On a miss the three requests run
    /// concurrently; if any fails the first observed error is returned and
    /// nothing is cached.
    pub async fn fetch(&self, point: GeoPoint) -> Result<Arc<WeatherPayload>, FetchError> {
        let key = point.key();

        if let Some(payload) = self.cache.get(&key) {
            debug!("Weather cache hit for {key}");
            return Ok(payload);
        }

        debug!("Fetching weather for {key} from {}", self.source.name());

        let (current, forecast, air_quality) = tokio::try_join!(
            self.source.current(point),
            self.source.forecast(point),
            self.source.air_quality(point),
        )
        .inspect_err(|e| warn!("Weather fetch for {key} failed: {e}"))?;

        let payload = Arc::new(WeatherPayload {
            current,
            forecast,
            air_quality,
        });

        self.cache.put(key, Arc::clone(&payload));
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::WEATHER_TTL;
    use crate::testing::FakeWeatherSource;
    use std::time::Duration;

    fn fetcher(source: &Arc<FakeWeatherSource>) -> WeatherFetcher {
        WeatherFetcher::new(
            Arc::clone(source) as Arc<dyn WeatherSource>,
            Arc::new(WeatherCache::new(WEATHER_TTL)),
        )
    }

    #[tokio::test]
    async fn test_fetch_caches_by_quantized_key() {
        let source = Arc::new(FakeWeatherSource::new("London", 18.0, "clear"));
        let fetcher = fetcher(&source);

        let first = fetcher.fetch(GeoPoint::new(51.5007, -0.1246)).await.unwrap();
        assert_eq!(first.current.temperature, 18.0);
        assert_eq!(first.current.condition, "clear");
        assert_eq!(source.calls(), 3);

        let key = CoordinateKey::new(51.5007, -0.1246);
        assert_eq!(key.to_string(), "51.5007,-0.1246");
        assert!(fetcher.cache().get(&key).is_some());

        let second = fetcher.fetch(GeoPoint::new(51.500_74, -0.124_58)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_fetch_is_all_or_nothing() {
        let source = Arc::new(FakeWeatherSource::new("London", 18.0, "clear"));
        source.fail_air_quality(FetchError::from_status("OpenWeatherMap", 401, Some("Invalid API key".into())));
        let fetcher = fetcher(&source);
        let point = GeoPoint::new(51.5007, -0.1246);

        let err = fetcher.fetch(point).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid API key");
        assert!(fetcher.cache().get(&point.key()).is_none());
        assert!(fetcher.cache().is_empty());
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_retried() {
        let source = Arc::new(FakeWeatherSource::new("London", 18.0, "clear"));
        source.fail_forecast(FetchError::Network("connection reset".into()));
        let fetcher = fetcher(&source);

        assert!(fetcher.fetch(GeoPoint::new(1.0, 2.0)).await.is_err());
        // try_join may stop polling the remaining requests once one fails
        assert!(source.calls() <= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_refreshes_after_ttl() {
        let source = Arc::new(FakeWeatherSource::new("London", 18.0, "clear"));
        let fetcher = fetcher(&source);
        let point = GeoPoint::new(51.5007, -0.1246);

        fetcher.fetch(point).await.unwrap();
        tokio::time::advance(WEATHER_TTL + Duration::from_secs(1)).await;
        fetcher.fetch(point).await.unwrap();

        assert_eq!(source.calls(), 6);
    }

    #[test]
    fn test_status_error_message_fallback() {
        let err = FetchError::from_status("OpenWeatherMap", 502, None);
        assert_eq!(err.to_string(), "OpenWeatherMap error 502");

        let err = FetchError::from_status("OpenWeatherMap", 404, Some("city not found".into()));
        assert_eq!(err.to_string(), "city not found");
    }
}
