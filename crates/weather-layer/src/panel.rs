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

//! Weather panel state shared by both map surfaces.
//!
//! Loads are tagged with a generation number. Only the newest load may
//! publish, so a slow response for an earlier point never replaces the
//! panel contents for a later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info};
use tokio::sync::watch;

use crate::cache::GeoPoint;
use crate::fetch::{WeatherFetcher, WeatherPayload};
use crate::summary::SummaryResolver;

#[derive(Debug, Clone, Default)]
pub enum PanelState {
    #[default]
    Idle,
    Loading {
        point: GeoPoint,
    },
    Loaded {
        point: GeoPoint,
        payload: Arc<WeatherPayload>,
        /// `None` until the summary chain has answered.
        summary: Option<String>,
    },
    Failed {
        point: GeoPoint,
        message: String,
    },
}

impl PanelState {
    pub fn point(&self) -> Option<GeoPoint> {
        match self {
            PanelState::Idle => None,
            PanelState::Loading { point }
            | PanelState::Loaded { point, .. }
            | PanelState::Failed { point, .. } => Some(*point),
        }
    }
}

/// How a single load ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Shown,
    Failed,
    /// A newer load started before this one finished; nothing was published.
    Superseded,
}

pub struct WeatherPanel {
    fetcher: WeatherFetcher,
    resolver: Arc<SummaryResolver>,
    generation: AtomicU64,
    last_point: Mutex<Option<GeoPoint>>,
    state: watch::Sender<PanelState>,
}

impl std::fmt::Debug for WeatherPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherPanel")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl WeatherPanel {
    #[must_use]
    pub fn new(fetcher: WeatherFetcher, resolver: Arc<SummaryResolver>) -> Self {
        let (state, _) = watch::channel(PanelState::Idle);
        Self {
            fetcher,
            resolver,
            generation: AtomicU64::new(0),
            last_point: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PanelState {
        self.state.borrow().clone()
    }

    pub fn fetcher(&self) -> &WeatherFetcher {
        &self.fetcher
    }

    /// Show weather for a point.
    ///
    /// A cached payload is shown immediately without a loading state. The
    /// summary follows once the provider chain answers.
    pub async fn load(&self, point: GeoPoint) -> LoadOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_point.lock().unwrap_or_else(PoisonError::into_inner) = Some(point);

        let payload = match self.fetcher.cached(point) {
            Some(payload) => payload,
            None => {
                self.publish(generation, PanelState::Loading { point });
                match self.fetcher.fetch(point).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        let failed = PanelState::Failed {
                            point,
                            message: e.to_string(),
                        };
                        return if self.publish(generation, failed) {
                            LoadOutcome::Failed
                        } else {
                            LoadOutcome::Superseded
                        };
                    }
                }
            }
        };

        let loaded = PanelState::Loaded {
            point,
            payload: Arc::clone(&payload),
            summary: None,
        };
        if !self.publish(generation, loaded) {
            return LoadOutcome::Superseded;
        }

        let summary = self.resolver.resolve(&payload).await;
        let loaded = PanelState::Loaded {
            point,
            payload,
            summary: Some(summary),
        };
        if self.publish(generation, loaded) {
            LoadOutcome::Shown
        } else {
            LoadOutcome::Superseded
        }
    }

    /// Load the last requested point again. `None` if nothing was requested yet.
    pub async fn retry(&self) -> Option<LoadOutcome> {
        let point = (*self.last_point.lock().unwrap_or_else(PoisonError::into_inner))?;
        info!("Retrying weather for {point}");
        Some(self.load(point).await)
    }

    fn publish(&self, generation: u64, next: PanelState) -> bool {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!("Dropping stale panel update for generation {generation}");
                return false;
            }
            *current = next;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{SUMMARY_TTL, WEATHER_TTL};
    use crate::fetch::{FetchError, WeatherCache, WeatherSource};
    use crate::summary::{LocalProvider, ProviderError, SummaryCache, SummaryProvider};
    use crate::testing::FakeWeatherSource;
    use async_trait::async_trait;
    use std::time::Duration;

    struct SlowProvider;

    #[async_trait]
    impl SummaryProvider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn generate(&self, _payload: &WeatherPayload) -> Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok("Slowly summarised.".to_string())
        }
    }

    fn panel_with(source: &Arc<FakeWeatherSource>, provider: Box<dyn SummaryProvider>) -> Arc<WeatherPanel> {
        let fetcher = WeatherFetcher::new(
            Arc::clone(source) as Arc<dyn WeatherSource>,
            Arc::new(WeatherCache::new(WEATHER_TTL)),
        );
        let resolver = SummaryResolver::new(vec![provider], Arc::new(SummaryCache::new(SUMMARY_TTL)));
        Arc::new(WeatherPanel::new(fetcher, Arc::new(resolver)))
    }

    fn location(state: &PanelState) -> Option<String> {
        match state {
            PanelState::Loaded { payload, .. } => Some(payload.location_name().to_string()),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_request_wins() {
        let source = Arc::new(FakeWeatherSource::new("Somewhere", 12.0, "overcast"));
        let slow = GeoPoint::new(48.8566, 2.3522);
        let fast = GeoPoint::new(52.52, 13.405);
        source.delay(slow, Duration::from_secs(2));
        source.name_point(slow, "Paris");
        source.name_point(fast, "Berlin");
        let panel = panel_with(&source, Box::new(LocalProvider));

        let first = tokio::spawn({
            let panel = Arc::clone(&panel);
            async move { panel.load(slow).await }
        });
        tokio::task::yield_now().await;
        assert!(matches!(panel.state(), PanelState::Loading { .. }));

        assert_eq!(panel.load(fast).await, LoadOutcome::Shown);
        assert_eq!(first.await.unwrap(), LoadOutcome::Superseded);

        let state = panel.state();
        assert_eq!(location(&state).as_deref(), Some("Berlin"));
        assert_eq!(state.point(), Some(fast));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_skips_loading_state() {
        let source = Arc::new(FakeWeatherSource::new("Madrid", 30.0, "clear"));
        let point = GeoPoint::new(40.4168, -3.7038);
        let panel = panel_with(&source, Box::new(SlowProvider));
        panel.fetcher().fetch(point).await.unwrap();

        let load = tokio::spawn({
            let panel = Arc::clone(&panel);
            async move { panel.load(point).await }
        });
        tokio::task::yield_now().await;

        match panel.state() {
            PanelState::Loaded { summary, .. } => assert!(summary.is_none()),
            other => panic!("expected loaded state, got {other:?}"),
        }

        assert_eq!(load.await.unwrap(), LoadOutcome::Shown);
        match panel.state() {
            PanelState::Loaded { summary, .. } => assert_eq!(summary.as_deref(), Some("Slowly summarised.")),
            other => panic!("expected loaded state, got {other:?}"),
        }
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let source = Arc::new(FakeWeatherSource::new("Oslo", -3.0, "snow"));
        source.fail_forecast(FetchError::from_status("OpenWeatherMap", 429, None));
        let panel = panel_with(&source, Box::new(LocalProvider));
        let point = GeoPoint::new(59.9139, 10.7522);

        assert_eq!(panel.load(point).await, LoadOutcome::Failed);
        match panel.state() {
            PanelState::Failed { message, .. } => assert_eq!(message, "OpenWeatherMap error 429"),
            other => panic!("expected failed state, got {other:?}"),
        }

        source.recover();
        assert_eq!(panel.retry().await, Some(LoadOutcome::Shown));
        assert_eq!(location(&panel.state()).as_deref(), Some("Oslo"));
    }

    #[tokio::test]
    async fn test_retry_without_request() {
        let source = Arc::new(FakeWeatherSource::new("Oslo", -3.0, "snow"));
        let panel = panel_with(&source, Box::new(LocalProvider));
        assert_eq!(panel.retry().await, None);
        assert!(matches!(panel.state(), PanelState::Idle));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let source = Arc::new(FakeWeatherSource::new("Lima", 19.0, "mist"));
        let panel = panel_with(&source, Box::new(LocalProvider));
        let mut rx = panel.subscribe();

        panel.load(GeoPoint::new(-12.0464, -77.0428)).await;
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        match state {
            PanelState::Loaded { summary, .. } => assert!(summary.unwrap().starts_with("Lima:")),
            other => panic!("expected loaded state, got {other:?}"),
        }
    }
}
