//! Domain errors for the Cadence coordination kernel.

use thiserror::Error;
use uuid::Uuid;

use super::models::{AgentId, DecisionStatus};

/// Domain-level errors that can occur in the Cadence kernel.
///
/// Governance authorization failures (`NotAuthorized`, `AlreadySigned`,
/// `InvalidDecisionStatus`) are always raised synchronously to the caller and
/// never retried.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Decision not found: {0}")]
    DecisionNotFound(Uuid),

    #[error("Agent {agent} is not authorized for decision {decision}")]
    NotAuthorized { agent: AgentId, decision: Uuid },

    #[error("Agent {agent} already signed decision {decision}")]
    AlreadySigned { agent: AgentId, decision: Uuid },

    #[error("Decision {decision} is {status}, expected pending")]
    InvalidDecisionStatus { decision: Uuid, status: DecisionStatus },

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Message delivery failed: {0}")]
    MessageDelivery(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: String, id: String },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
