use thiserror::Error;

/// Main error type for the settlement pipeline
#[derive(Error, Debug)]
pub enum TallyError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transient network error: {0}")]
    Transient(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Client error (HTTP {status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("Provider error: {0}")]
    Provider(String),

    // Circuit breaker errors
    #[error("Circuit '{breaker}' is open, retry in {retry_in_secs}s")]
    CircuitOpen { breaker: String, retry_in_secs: u64 },

    #[error("All providers unavailable for {operation} ({league})")]
    AllProvidersUnavailable { operation: String, league: String },

    // Data errors
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TallyError {
    /// Whether a provider call failing with this error may be retried
    /// in place. Only network-level transience qualifies; rate limits
    /// and 4xx responses must not be retried against the same provider.
    pub fn is_transient(&self) -> bool {
        matches!(self, TallyError::Transient(_))
    }

    /// Whether the failover loop should move straight to the next
    /// provider without remembering this as the batch's last error.
    pub fn skips_provider(&self) -> bool {
        matches!(
            self,
            TallyError::CircuitOpen { .. } | TallyError::RateLimited(_)
        )
    }
}

/// Result type alias for TallyError
pub type Result<T> = std::result::Result<T, TallyError>;
