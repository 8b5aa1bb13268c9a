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

//! Weather overlay and data resilience layer for 2D/3D map surfaces.
//!
//! The crate is split into layers that build on each other:
//!
//! - **Cache**: quantized coordinate keys, content fingerprints and TTL caches
//!   with a background sweeper
//! - **Fetch**: concurrent all-or-nothing weather fetches written through the
//!   weather cache
//! - **Summary**: prose summaries from an ordered provider chain that always
//!   ends in a deterministic local provider
//! - **Overlay**: diff-based synchronization of imagery overlays with a
//!   surface, keyed by layer id and reference date
//! - **Panel / Surface**: a surface-agnostic weather panel and the coordinator
//!   that routes commands to whichever map surface is active
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use weather_layer::{
//!     GeoPoint, OpenWeatherMapClient, ServiceKeys, SummaryCache, SummaryResolver, WeatherCache,
//!     WeatherFetcher, SUMMARY_TTL, WEATHER_TTL,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let keys = ServiceKeys::resolve(None, None, None);
//!     let client = OpenWeatherMapClient::new(keys.openweathermap.clone())?;
//!     let fetcher = WeatherFetcher::new(Arc::new(client), Arc::new(WeatherCache::new(WEATHER_TTL)));
//!     let summaries = SummaryResolver::with_credentials(&keys, Arc::new(SummaryCache::new(SUMMARY_TTL)));
//!
//!     let payload = fetcher.fetch(GeoPoint::new(51.5007, -0.1246)).await?;
//!     println!("{}", summaries.resolve(&payload).await);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod fetch;
pub mod keys;
pub mod overlay;
pub mod panel;
pub mod summary;
pub mod surface;

#[cfg(test)]
mod testing;

pub use cache::{
    conditions_fingerprint, spawn_sweeper, CacheEntry, CoordinateKey, GeoPoint, TtlCache, SUMMARY_TTL,
    SWEEP_INTERVAL, WEATHER_TTL,
};
pub use fetch::{
    AirQualitySnapshot, ConditionsSnapshot, FetchError, OpenWeatherMapClient, WeatherCache, WeatherFetcher,
    WeatherPayload, WeatherSource,
};
pub use keys::{KeySource, ServiceKeys};
pub use overlay::{
    Basemap, ImageryHandleId, ImageryKind, ImageryRequest, ImagerySurface, OverlayError, OverlayRegistry,
    ReconcileReport, SourceDescriptor, SourceResolver,
};
pub use panel::{LoadOutcome, PanelState, WeatherPanel};
pub use summary::{ProviderError, SummaryCache, SummaryProvider, SummaryResolver};
pub use surface::{
    CommandOutcome, MapSurface, OverlayDescriptor, OverlaySelection, SurfaceCoordinator, SurfaceError,
    SurfaceKind,
};
