//! Provider construction from configuration.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::Result;

use super::{
    parse_provider_kind, EspnProvider, ProviderHttp, ProviderKind, RapidApiProvider,
    SportsProvider, TheOddsProvider,
};

/// Build the provider list in configured priority order.
///
/// Providers missing credentials are skipped rather than failing startup; an
/// empty list is legal and leaves the orchestrator serving from cache only.
pub fn build_providers(config: &AppConfig) -> Result<Vec<Arc<dyn SportsProvider>>> {
    let http = ProviderHttp::new(config.providers.request_timeout_secs, &config.retry)?;

    let mut providers: Vec<Arc<dyn SportsProvider>> = Vec::new();

    for name in &config.providers.priority {
        match parse_provider_kind(name)? {
            ProviderKind::Espn => {
                if config.providers.espn.enabled {
                    providers.push(Arc::new(EspnProvider::new(
                        &config.providers.espn,
                        http.clone(),
                    )));
                    info!("ESPN provider initialized");
                } else {
                    info!("ESPN provider disabled, skipping");
                }
            }
            ProviderKind::TheOdds => {
                if !config.providers.theodds.api_key.is_empty() {
                    providers.push(Arc::new(TheOddsProvider::new(
                        &config.providers.theodds,
                        http.clone(),
                    )));
                    info!("The Odds API provider initialized");
                } else {
                    info!("The Odds API key not configured, skipping");
                }
            }
            ProviderKind::RapidApi => {
                if !config.providers.rapidapi.api_key.is_empty() {
                    providers.push(Arc::new(RapidApiProvider::new(
                        &config.providers.rapidapi,
                        http.clone(),
                    )));
                    info!("RapidAPI provider initialized");
                } else {
                    info!("RapidAPI key not configured, skipping");
                }
            }
        }
    }

    if providers.is_empty() {
        warn!("No sports data providers configured");
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BreakerConfig, CacheConfig, DatabaseConfig, LoggingConfig, ProvidersConfig, RetryConfig,
        SchedulerConfig,
    };

    fn test_config() -> AppConfig {
        AppConfig {
            providers: ProvidersConfig::default(),
            breaker: BreakerConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/tally".to_string(),
                max_connections: 5,
            },
            logging: LoggingConfig::default(),
            health_port: None,
        }
    }

    #[test]
    fn default_config_builds_espn_only() {
        let providers = build_providers(&test_config()).expect("factory should succeed");

        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].kind(), ProviderKind::Espn);
    }

    #[test]
    fn keys_enable_providers_in_priority_order() {
        let mut config = test_config();
        config.providers.theodds.api_key = "odds-key".to_string();
        config.providers.rapidapi.api_key = "rapid-key".to_string();

        let providers = build_providers(&config).expect("factory should succeed");

        let kinds: Vec<ProviderKind> = providers.iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ProviderKind::Espn,
                ProviderKind::TheOdds,
                ProviderKind::RapidApi
            ]
        );
    }

    #[test]
    fn disabled_espn_is_skipped() {
        let mut config = test_config();
        config.providers.espn.enabled = false;

        let providers = build_providers(&config).expect("factory should succeed");
        assert!(providers.is_empty());
    }

    #[test]
    fn unknown_priority_entry_is_an_error() {
        let mut config = test_config();
        config.providers.priority = vec!["espn".to_string(), "sportsradar".to_string()];

        assert!(build_providers(&config).is_err());
    }
}
