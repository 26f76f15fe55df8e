//! Coordination Layer for Resilient Ingestion
//!
//! This module provides coordination infrastructure for reliable operation:
//! - Circuit breakers guarding upstream provider calls
//! - Per-competition write serialization
//! - Graceful shutdown handling for scheduler loops

pub mod circuit_breaker;
pub mod locks;
pub mod shutdown;

pub use circuit_breaker::{
    ApiCircuitBreaker, BreakerRegistry, BreakerSettings, BreakerStatus, CircuitState,
};
pub use locks::CompetitionLocks;
pub use shutdown::{wait_for_signal, ShutdownController, ShutdownToken};
