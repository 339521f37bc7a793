//! In-memory collaborators for tests, simulations and embedded use.

mod agent_registry;
mod governance_repository;
mod whiteboard;

pub use agent_registry::InMemoryAgentRegistry;
pub use governance_repository::InMemoryGovernanceRepository;
pub use whiteboard::InMemoryWhiteboard;
