pub mod cache;
pub mod health;
pub mod scheduler;
pub mod settlement;
pub mod sports_data;

pub use cache::ResponseCache;
pub use health::{HealthServer, HealthState, LivenessResponse};
pub use scheduler::{ScheduledTask, SettlementScheduler};
pub use settlement::{LifecycleSummary, RefreshSummary, SettlementService};
pub use sports_data::{Operation, ServiceHealth, SportsDataService};
