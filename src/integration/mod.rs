//! Integration layer: configuration, backend health, and the turn orchestrator

pub mod config;
pub mod health;
pub mod orchestrator;

pub use config::SessionConfig;
pub use health::{HealthClient, HealthReport};
pub use orchestrator::{OrchestratorBuilder, SessionOrchestrator, TurnHandle};
