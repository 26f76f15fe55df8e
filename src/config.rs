use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Health server port; unset disables the server
    #[serde(default)]
    pub health_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Failover order; earlier providers are tried first
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub espn: EspnConfig,
    #[serde(default)]
    pub theodds: TheOddsConfig,
    #[serde(default)]
    pub rapidapi: RapidApiConfig,
}

fn default_priority() -> Vec<String> {
    vec![
        "espn".to_string(),
        "theodds".to_string(),
        "rapidapi".to_string(),
    ]
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            request_timeout_secs: default_request_timeout(),
            espn: EspnConfig::default(),
            theodds: TheOddsConfig::default(),
            rapidapi: RapidApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspnConfig {
    /// Public scoreboard API, no key required
    #[serde(default = "default_espn_base_url")]
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_espn_base_url() -> String {
    "https://site.api.espn.com/apis/site/v2/sports".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for EspnConfig {
    fn default() -> Self {
        Self {
            base_url: default_espn_base_url(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TheOddsConfig {
    #[serde(default = "default_theodds_base_url")]
    pub base_url: String,
    /// Empty key disables the provider
    #[serde(default)]
    pub api_key: String,
}

fn default_theodds_base_url() -> String {
    "https://api.the-odds-api.com/v4".to_string()
}

impl Default for TheOddsConfig {
    fn default() -> Self {
        Self {
            base_url: default_theodds_base_url(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RapidApiConfig {
    /// Empty key disables the provider
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a half-open trial
    #[serde(default = "default_open_timeout")]
    pub open_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_timeout() -> u64 {
    60
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_timeout_secs: default_open_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per provider call (first try included)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for exponential backoff
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Backoff cap
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for schedule responses
    #[serde(default = "default_schedule_ttl")]
    pub schedule_ttl_secs: u64,
    /// TTL for live-score responses
    #[serde(default = "default_live_ttl")]
    pub live_ttl_secs: u64,
    /// TTL for single-game result responses
    #[serde(default = "default_live_ttl")]
    pub result_ttl_secs: u64,
    /// Maximum cached entries before stale eviction kicks in
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_schedule_ttl() -> u64 {
    3600
}

fn default_live_ttl() -> u64 {
    60
}

fn default_cache_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schedule_ttl_secs: default_schedule_ttl(),
            live_ttl_secs: default_live_ttl(),
            result_ttl_secs: default_live_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Result refresh period in seconds
    #[serde(default = "default_score_refresh")]
    pub score_refresh_secs: u64,
    /// Pick locking period in seconds
    #[serde(default = "default_score_refresh")]
    pub pick_lock_secs: u64,
    /// Competition lifecycle period in seconds
    #[serde(default = "default_lifecycle")]
    pub lifecycle_secs: u64,
    /// Deferred-deletion sweep period in seconds
    #[serde(default = "default_deletion_sweep")]
    pub deletion_sweep_secs: u64,
    /// Grace period before a pending deletion is executed
    #[serde(default = "default_deletion_grace")]
    pub deletion_grace_days: i64,
    /// Upper bound for a single tick; a stuck tick is abandoned after this
    #[serde(default = "default_tick_timeout")]
    pub tick_timeout_secs: u64,
    /// How long shutdown waits for in-flight ticks
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_score_refresh() -> u64 {
    60
}

fn default_lifecycle() -> u64 {
    300
}

fn default_deletion_sweep() -> u64 {
    86_400
}

fn default_deletion_grace() -> i64 {
    30
}

fn default_tick_timeout() -> u64 {
    300
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            score_refresh_secs: default_score_refresh(),
            pick_lock_secs: default_score_refresh(),
            lifecycle_secs: default_lifecycle(),
            deletion_sweep_secs: default_deletion_sweep(),
            deletion_grace_days: default_deletion_grace(),
            tick_timeout_secs: default_tick_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.url", "postgres://localhost/tally")?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TALLY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TALLY_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("TALLY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        const KNOWN_PROVIDERS: [&str; 3] = ["espn", "theodds", "rapidapi"];

        if self.providers.priority.is_empty() {
            errors.push("providers.priority must not be empty".to_string());
        }
        for name in &self.providers.priority {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                errors.push(format!("unknown provider in priority list: {name}"));
            }
        }

        if self.breaker.failure_threshold == 0 {
            errors.push("breaker.failure_threshold must be at least 1".to_string());
        }

        if self.retry.max_retries == 0 {
            errors.push("retry.max_retries must be at least 1".to_string());
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            errors.push("retry.base_delay_ms must not exceed retry.max_delay_ms".to_string());
        }

        if self.scheduler.score_refresh_secs == 0
            || self.scheduler.pick_lock_secs == 0
            || self.scheduler.lifecycle_secs == 0
            || self.scheduler.deletion_sweep_secs == 0
        {
            errors.push("scheduler periods must be positive".to_string());
        }

        if self.scheduler.tick_timeout_secs == 0 {
            errors.push("scheduler.tick_timeout_secs must be positive".to_string());
        }

        if self.scheduler.deletion_grace_days < 0 {
            errors.push("scheduler.deletion_grace_days must not be negative".to_string());
        }

        if self.database.url.is_empty() {
            errors.push("database.url must be set".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
