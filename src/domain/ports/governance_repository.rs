//! Governance repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    AgentId, AuditEventType, AuditRecord, Decision, DecisionStatus, ElectionResult, Message,
};

/// Filter criteria for listing audit records.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub task_id: Option<String>,
    pub decision_id: Option<Uuid>,
    pub agent_id: Option<AgentId>,
    pub event_type: Option<AuditEventType>,
}

impl AuditFilter {
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.task_id.as_ref().map_or(true, |t| *t == record.task_id)
            && self.decision_id.map_or(true, |d| record.decision_id == Some(d))
            && self.agent_id.as_ref().map_or(true, |a| *a == record.agent_id)
            && self.event_type.map_or(true, |e| e == record.event_type)
    }
}

/// Storage collaborator for the governance engine and the message bus.
///
/// Every call is expected to be durable before it returns.
#[async_trait]
pub trait GovernanceRepository: Send + Sync {
    // Decision operations

    /// Insert a newly proposed decision.
    async fn insert_decision(&self, decision: &Decision) -> DomainResult<()>;

    /// Get a decision by ID.
    async fn get_decision(&self, id: Uuid) -> DomainResult<Option<Decision>>;

    /// List decisions belonging to a task.
    async fn list_decisions(&self, task_id: &str) -> DomainResult<Vec<Decision>>;

    /// Append a signer to a decision.
    async fn add_signer(&self, id: Uuid, signer: &AgentId) -> DomainResult<()>;

    /// Append a vetoer to a decision.
    async fn add_vetoer(&self, id: Uuid, vetoer: &AgentId) -> DomainResult<()>;

    /// Set a decision's status.
    async fn update_status(&self, id: Uuid, status: DecisionStatus) -> DomainResult<()>;

    /// Mark a decision approved at the given time.
    async fn approve(&self, id: Uuid, approved_at: DateTime<Utc>) -> DomainResult<()>;

    // Audit operations

    async fn insert_audit(&self, record: &AuditRecord) -> DomainResult<()>;

    async fn list_audits(&self, filter: AuditFilter) -> DomainResult<Vec<AuditRecord>>;

    // Election operations

    async fn insert_election(&self, result: &ElectionResult) -> DomainResult<()>;

    /// List election results for a task, ordered by round.
    async fn list_elections(&self, task_id: &str) -> DomainResult<Vec<ElectionResult>>;

    // Message operations

    async fn insert_message(&self, message: &Message) -> DomainResult<()>;

    async fn list_messages(&self, task_id: &str) -> DomainResult<Vec<Message>>;
}
