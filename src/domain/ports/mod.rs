//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - GovernanceRepository: persistence for decisions, audits, elections and messages
//! - AgentRegistry: identity, layer and supervisor lookup
//! - Whiteboard: the shared document store decisions are recorded to
//!
//! These traits keep the kernel independent of specific storage backends.

pub mod agent_registry;
pub mod governance_repository;
pub mod whiteboard;

pub use agent_registry::AgentRegistry;
pub use governance_repository::{AuditFilter, GovernanceRepository};
pub use whiteboard::Whiteboard;
