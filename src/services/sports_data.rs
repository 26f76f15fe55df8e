//! Failover orchestrator for sports data.
//!
//! Tries providers in configured priority order, each call gated by a
//! per-(provider, operation) circuit breaker, with write-through caching and
//! stale-cache fallback when every provider is down.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, CacheConfig};
use crate::coordination::{BreakerRegistry, BreakerSettings, BreakerStatus};
use crate::domain::NormalizedResult;
use crate::error::{Result, TallyError};
use crate::providers::{build_providers, SportsProvider};

use super::cache::ResponseCache;

/// Provider capability, used in breaker keys and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Schedule,
    LiveScores,
    GameDetails,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::LiveScores => "live_scores",
            Self::GameDetails => "game_details",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only health snapshot for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub configured_providers: Vec<String>,
    pub breakers: Vec<BreakerStatus>,
    pub cache_status: String,
    pub cache_entries: usize,
}

pub struct SportsDataService {
    providers: Vec<Arc<dyn SportsProvider>>,
    breakers: BreakerRegistry,
    cache: ResponseCache,
    cache_config: CacheConfig,
}

impl SportsDataService {
    pub fn new(
        providers: Vec<Arc<dyn SportsProvider>>,
        breaker_settings: BreakerSettings,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            providers,
            breakers: BreakerRegistry::new(breaker_settings),
            cache: ResponseCache::new(cache_config.max_entries),
            cache_config,
        }
    }

    /// Build the full service from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let providers = build_providers(config)?;
        Ok(Self::new(
            providers,
            BreakerSettings::from(&config.breaker),
            config.cache.clone(),
        ))
    }

    /// Shared cache handle for settlement-driven invalidation.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch the schedule for a league with automatic failover.
    ///
    /// An empty schedule from one provider is not treated as usable; the next
    /// provider gets a chance to fill it in.
    pub async fn get_schedule(
        &self,
        league: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        use_cache: bool,
    ) -> Result<Vec<NormalizedResult>> {
        let cache_key = format!(
            "schedule:{}:{}:{}",
            league,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        if use_cache {
            if let Some(games) = self.read_cache(&cache_key) {
                info!("Cache hit for {}", cache_key);
                return Ok(games);
            }
        }

        let mut last_error: Option<TallyError> = None;

        for provider in &self.providers {
            let kind = provider.kind();
            let breaker = self
                .breakers
                .get_or_create(kind.as_str(), Operation::Schedule.as_str());

            if let Err(e) = breaker.check().await {
                warn!("{} circuit breaker is open, skipping", kind);
                last_error = Some(e);
                continue;
            }

            info!("Attempting {} for schedule ({})", kind, league);

            match provider.get_schedule(league, start, end).await {
                Ok(games) => {
                    breaker.record_success().await;

                    if !games.is_empty() {
                        info!("Success with {} - {} games", kind, games.len());
                        self.write_cache(&cache_key, &games, self.cache_config.schedule_ttl_secs);
                        return Ok(games);
                    }
                }
                Err(e) => {
                    breaker.record_failure().await;
                    self.log_provider_error(kind.as_str(), &e);
                    last_error = Some(e);
                }
            }
        }

        self.log_exhausted(Operation::Schedule, league, &last_error);

        if let Some(games) = self.read_stale(&cache_key) {
            warn!("Returning stale cache data for schedule ({})", league);
            return Ok(games);
        }

        Err(TallyError::AllProvidersUnavailable {
            operation: Operation::Schedule.as_str().to_string(),
            league: league.to_string(),
        })
    }

    /// Fetch live scores for a league with automatic failover.
    ///
    /// An empty list is a usable answer here: no games in progress.
    pub async fn get_live_results(
        &self,
        league: &str,
        use_cache: bool,
    ) -> Result<Vec<NormalizedResult>> {
        let cache_key = format!("live_scores:{}", league);

        if use_cache {
            if let Some(games) = self.read_cache(&cache_key) {
                debug!("Cache hit for {}", cache_key);
                return Ok(games);
            }
        }

        let mut last_error: Option<TallyError> = None;

        for provider in &self.providers {
            let kind = provider.kind();
            let breaker = self
                .breakers
                .get_or_create(kind.as_str(), Operation::LiveScores.as_str());

            if let Err(e) = breaker.check().await {
                warn!("{} circuit breaker is open, skipping", kind);
                last_error = Some(e);
                continue;
            }

            debug!("Attempting {} for live scores ({})", kind, league);

            match provider.get_live_results(league).await {
                Ok(games) => {
                    breaker.record_success().await;
                    info!("Success with {} - {} live games", kind, games.len());
                    self.write_cache(&cache_key, &games, self.cache_config.live_ttl_secs);
                    return Ok(games);
                }
                Err(e) => {
                    breaker.record_failure().await;
                    self.log_provider_error(kind.as_str(), &e);
                    last_error = Some(e);
                }
            }
        }

        self.log_exhausted(Operation::LiveScores, league, &last_error);

        if let Some(games) = self.read_stale(&cache_key) {
            warn!("Returning stale cache data for live scores ({})", league);
            return Ok(games);
        }

        Err(TallyError::AllProvidersUnavailable {
            operation: Operation::LiveScores.as_str().to_string(),
            league: league.to_string(),
        })
    }

    /// Fetch a single game result with automatic failover.
    ///
    /// Exhaustion resolves to `Ok(None)` rather than an error: an absent
    /// result is handled by the caller retrying next tick.
    pub async fn get_result(
        &self,
        league: &str,
        external_id: &str,
        use_cache: bool,
    ) -> Result<Option<NormalizedResult>> {
        let cache_key = format!("game_details:{}:{}", league, external_id);

        if use_cache {
            if let Some(games) = self.read_cache(&cache_key) {
                debug!("Cache hit for {}", cache_key);
                return Ok(games.into_iter().next());
            }
        }

        for provider in &self.providers {
            let kind = provider.kind();
            let breaker = self
                .breakers
                .get_or_create(kind.as_str(), Operation::GameDetails.as_str());

            if breaker.check().await.is_err() {
                warn!("{} circuit breaker is open, skipping", kind);
                continue;
            }

            match provider.get_result(league, external_id).await {
                Ok(Some(game)) => {
                    breaker.record_success().await;
                    info!("Success with {} for game {}", kind, external_id);
                    self.write_cache(
                        &cache_key,
                        std::slice::from_ref(&game),
                        self.cache_config.result_ttl_secs,
                    );
                    return Ok(Some(game));
                }
                Ok(None) => {
                    breaker.record_success().await;
                }
                Err(e) => {
                    breaker.record_failure().await;
                    self.log_provider_error(kind.as_str(), &e);
                }
            }
        }

        error!("All providers failed for game {} ({})", external_id, league);

        if let Some(games) = self.read_stale(&cache_key) {
            warn!("Returning stale cache data for game {}", external_id);
            return Ok(games.into_iter().next());
        }

        Ok(None)
    }

    /// Health snapshot of providers, breakers, and cache.
    pub async fn health(&self) -> ServiceHealth {
        ServiceHealth {
            configured_providers: self
                .providers
                .iter()
                .map(|p| p.kind().as_str().to_string())
                .collect(),
            breakers: self.breakers.statuses().await,
            cache_status: "connected".to_string(),
            cache_entries: self.cache.len(),
        }
    }

    /// Operator action: force every breaker back to closed.
    pub async fn reset_breakers(&self) {
        self.breakers.reset_all().await;
    }

    fn read_cache(&self, key: &str) -> Option<Vec<NormalizedResult>> {
        self.cache
            .get_fresh(key)
            .and_then(|payload| Self::decode(key, &payload))
    }

    fn read_stale(&self, key: &str) -> Option<Vec<NormalizedResult>> {
        self.cache
            .get_stale(key)
            .and_then(|payload| Self::decode(key, &payload))
    }

    fn write_cache(&self, key: &str, games: &[NormalizedResult], ttl_secs: u64) {
        match serde_json::to_string(games) {
            Ok(payload) => self.cache.put(key, payload, ttl_secs),
            Err(e) => error!("Failed to serialize cache entry {}: {}", key, e),
        }
    }

    fn decode(key: &str, payload: &str) -> Option<Vec<NormalizedResult>> {
        match serde_json::from_str(payload) {
            Ok(games) => Some(games),
            Err(e) => {
                // Corrupt entries count as misses
                error!("Failed to decode cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn log_provider_error(&self, provider: &str, error: &TallyError) {
        match error {
            TallyError::RateLimited(_) => {
                warn!("{} rate limit exceeded, trying next provider", provider);
            }
            other => {
                error!("{} failed: {}", provider, other);
            }
        }
    }

    fn log_exhausted(&self, operation: Operation, league: &str, last_error: &Option<TallyError>) {
        match last_error {
            Some(e) => error!(
                "All providers failed for {} ({}). Last error: {}",
                operation, league, e
            ),
            None => error!("All providers failed for {} ({})", operation, league),
        }
    }
}
