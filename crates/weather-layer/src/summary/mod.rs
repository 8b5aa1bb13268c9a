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

//! Weather summary resolution with provider failover.
//!
//! Summaries come from an ordered list of [`SummaryProvider`]s. The first
//! provider that returns non-empty text wins; failures are logged and the
//! walk moves on. The deterministic [`LocalProvider`] backs every chain, so
//! [`SummaryResolver::resolve`] always produces text.
//!
//! Results are cached in their own namespace, keyed by a fingerprint of the
//! described conditions rather than the coordinate, so nearby points with the
//! same reading share one summary.

mod llm;
mod local;

pub use llm::{build_prompt, AnthropicProvider, OpenAiProvider};
pub use local::LocalProvider;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;

use crate::cache::{conditions_fingerprint, TtlCache};
use crate::fetch::WeatherPayload;
use crate::keys::ServiceKeys;

/// Summary text namespace of the cache store.
pub type SummaryCache = TtlCache<String, String>;

/// A single provider failed. Never surfaced past the resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("no credentials configured for {0}")]
    MissingCredentials(&'static str),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("provider returned no text")]
    Empty,
}

/// One way of turning a weather payload into prose.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, payload: &WeatherPayload) -> Result<String, ProviderError>;
}

/// Walks summary providers in priority order and caches the accepted text.
pub struct SummaryResolver {
    providers: Vec<Box<dyn SummaryProvider>>,
    cache: Arc<SummaryCache>,
}

impl std::fmt::Debug for SummaryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("SummaryResolver")
            .field("providers", &names)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl SummaryResolver {
    #[must_use]
    pub fn new(providers: Vec<Box<dyn SummaryProvider>>, cache: Arc<SummaryCache>) -> Self {
        Self { providers, cache }
    }

    /// Build the standard chain: provider A, provider B, then the local
    /// provider. Providers without a key are left out.
    #[must_use]
    pub fn with_credentials(keys: &ServiceKeys, cache: Arc<SummaryCache>) -> Self {
        let mut providers: Vec<Box<dyn SummaryProvider>> = Vec::new();

        match keys.anthropic.clone() {
            Some(key) => match AnthropicProvider::new(key) {
                Ok(provider) => providers.push(Box::new(provider)),
                Err(e) => warn!("Anthropic summaries disabled: {e}"),
            },
            None => info!("No Anthropic API key, skipping that summary provider"),
        }

        match keys.openai.clone() {
            Some(key) => match OpenAiProvider::new(key) {
                Ok(provider) => providers.push(Box::new(provider)),
                Err(e) => warn!("OpenAI summaries disabled: {e}"),
            },
            None => info!("No OpenAI API key, skipping that summary provider"),
        }

        providers.push(Box::new(LocalProvider));
        Self::new(providers, cache)
    }

    /// Provider names in the order they are tried.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    /// Produce a summary for the payload. Never fails.
    pub async fn resolve(&self, payload: &WeatherPayload) -> String {
        let key = conditions_fingerprint(
            payload.location_name(),
            payload.current.temperature,
            &payload.current.condition,
        );

        if let Some(text) = self.cache.get(&key) {
            debug!("Summary cache hit for {}", payload.location_name());
            return text;
        }

        let mut accepted = None;
        for provider in &self.providers {
            match provider.generate(payload).await {
                Ok(text) if !text.trim().is_empty() => {
                    debug!("Summary provided by {}", provider.name());
                    accepted = Some(text.trim().to_string());
                    break;
                }
                Ok(_) => warn!("Summary provider {} failed: {}", provider.name(), ProviderError::Empty),
                Err(e) => warn!("Summary provider {} failed: {e}", provider.name()),
            }
        }

        let text = accepted.unwrap_or_else(|| LocalProvider.describe(payload));
        self.cache.put(key, text.clone());
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SUMMARY_TTL;
    use crate::testing::{payload, ScriptedProvider};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn cache() -> Arc<SummaryCache> {
        Arc::new(SummaryCache::new(SUMMARY_TTL))
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let a = ScriptedProvider::ok("a", "Summary from A.");
        let b = ScriptedProvider::ok("b", "Summary from B.");
        let b_calls = b.counter();
        let resolver = SummaryResolver::new(vec![Box::new(a), Box::new(b)], cache());

        let text = resolver.resolve(&payload("London", 18.0, "clear")).await;
        assert_eq!(text, "Summary from A.");
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_local_provider() {
        let a = ScriptedProvider::failing("a", ProviderError::Network("timeout".into()));
        let b = ScriptedProvider::failing("b", ProviderError::MissingCredentials("b"));
        let resolver = SummaryResolver::new(
            vec![Box::new(a), Box::new(b), Box::new(LocalProvider)],
            cache(),
        );

        let text = resolver.resolve(&payload("London", 18.0, "clear")).await;
        assert!(!text.is_empty());
        assert_eq!(text, LocalProvider.describe(&payload("London", 18.0, "clear")));
    }

    #[tokio::test]
    async fn test_empty_text_counts_as_failure() {
        let a = ScriptedProvider::ok("a", "   ");
        let b = ScriptedProvider::ok("b", "  Summary from B.\n");
        let resolver = SummaryResolver::new(vec![Box::new(a), Box::new(b)], cache());

        assert_eq!(resolver.resolve(&payload("Paris", 21.0, "few clouds")).await, "Summary from B.");
    }

    #[tokio::test]
    async fn test_chain_without_local_still_returns_text() {
        let a = ScriptedProvider::failing("a", ProviderError::Status { status: 500, body: String::new() });
        let resolver = SummaryResolver::new(vec![Box::new(a)], cache());

        let text = resolver.resolve(&payload("Oslo", -4.0, "snow")).await;
        assert!(text.contains("Oslo"));
    }

    #[tokio::test]
    async fn test_cache_reused_for_same_conditions() {
        let a = ScriptedProvider::ok("a", "Sunny in London.");
        let a_calls = a.counter();
        let resolver = SummaryResolver::new(vec![Box::new(a)], cache());

        let first = payload("London", 18.0, "clear");
        let mut second = payload("London", 18.0, "clear");
        // Different raw reading and forecast, same described conditions.
        second.current.temperature = 18.3;
        second.current.humidity = 80;
        second.forecast.clear();

        assert_eq!(resolver.resolve(&first).await, "Sunny in London.");
        assert_eq!(resolver.resolve(&second).await, "Sunny in London.");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_cache_expires() {
        let a = ScriptedProvider::ok("a", "Sunny in London.");
        let a_calls = a.counter();
        let resolver = SummaryResolver::new(vec![Box::new(a)], cache());
        let p = payload("London", 18.0, "clear");

        resolver.resolve(&p).await;
        tokio::time::advance(SUMMARY_TTL - Duration::from_secs(1)).await;
        resolver.resolve(&p).await;
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        resolver.resolve(&p).await;
        assert_eq!(a_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_with_credentials_skips_missing_keys() {
        let resolver = SummaryResolver::with_credentials(&ServiceKeys::default(), cache());
        assert_eq!(resolver.provider_names(), vec!["local"]);

        let keys = ServiceKeys {
            openai: Some("sk-test".into()),
            ..Default::default()
        };
        let resolver = SummaryResolver::with_credentials(&keys, cache());
        assert_eq!(resolver.provider_names(), vec!["openai", "local"]);
    }
}
