pub mod adapters;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod providers;
pub mod services;

pub use adapters::PostgresStore;
pub use config::AppConfig;
pub use coordination::{
    ApiCircuitBreaker, BreakerRegistry, BreakerSettings, BreakerStatus, CircuitState,
    CompetitionLocks, ShutdownController, ShutdownToken,
};
pub use domain::{GameStatus, NormalizedResult};
pub use error::{Result, TallyError};
pub use providers::{ProviderKind, SportsProvider};
pub use services::{
    HealthServer, ResponseCache, ServiceHealth, SettlementScheduler, SettlementService,
    SportsDataService,
};
