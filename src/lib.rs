//! Cadence - heartbeat-synchronized coordination kernel
//!
//! Cadence coordinates a three-layer team of agents (top, mid, bottom) on a
//! shared heartbeat. It routes prioritized messages between agents, governs
//! multi-signature decisions with vetoes and timeouts, runs periodic
//! performance elections, and recovers from agent failures by retrying,
//! handing work to idle peers, or escalating up the supervision chain.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, ports and errors
//! - **Service Layer** (`services`): heartbeat clock, message bus, governance, recovery
//! - **Adapters** (`adapters`): in-memory and SQLite implementations of the ports
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cadence::adapters::memory::InMemoryGovernanceRepository;
//! use cadence::domain::models::{BusConfig, DecisionProposal, DecisionType, GovernanceConfig};
//! use cadence::services::{GovernanceContext, GovernanceEngine, MessageBus};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let bus = Arc::new(MessageBus::new(BusConfig::default()));
//! for agent in ["top-1", "mid-1"] {
//!     bus.register_agent(agent).await;
//! }
//! let ctx = GovernanceContext::new(Arc::new(InMemoryGovernanceRepository::new()), bus);
//! let engine = GovernanceEngine::new(ctx, GovernanceConfig::default());
//!
//! let decision = engine
//!     .propose(DecisionProposal::new(
//!         "task-1",
//!         "mid-1",
//!         DecisionType::TaskAllocation,
//!         serde_json::json!({"assign": "bottom-1"}),
//!         vec!["top-1".into()],
//!     ))
//!     .await?;
//! engine.sign(decision.id, &"top-1".into()).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::Config;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{GovernanceEngine, HeartbeatClock, MessageBus, RecoveryCoordinator};
