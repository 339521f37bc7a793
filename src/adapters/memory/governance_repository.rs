use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentId, AuditRecord, Decision, DecisionStatus, ElectionResult, Message,
};
use crate::domain::ports::{AuditFilter, GovernanceRepository};

#[derive(Default)]
struct Tables {
    decisions: HashMap<Uuid, Decision>,
    audits: Vec<AuditRecord>,
    elections: Vec<ElectionResult>,
    messages: Vec<Message>,
}

/// Governance repository backed by process memory.
#[derive(Default)]
pub struct InMemoryGovernanceRepository {
    tables: RwLock<Tables>,
}

impl InMemoryGovernanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn with_decision<F>(&self, id: Uuid, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut Decision) + Send,
    {
        let mut tables = self.tables.write().await;
        let decision = tables
            .decisions
            .get_mut(&id)
            .ok_or(DomainError::DecisionNotFound(id))?;
        f(decision);
        Ok(())
    }
}

#[async_trait]
impl GovernanceRepository for InMemoryGovernanceRepository {
    async fn insert_decision(&self, decision: &Decision) -> DomainResult<()> {
        self.tables
            .write()
            .await
            .decisions
            .insert(decision.id, decision.clone());
        Ok(())
    }

    async fn get_decision(&self, id: Uuid) -> DomainResult<Option<Decision>> {
        Ok(self.tables.read().await.decisions.get(&id).cloned())
    }

    async fn list_decisions(&self, task_id: &str) -> DomainResult<Vec<Decision>> {
        let tables = self.tables.read().await;
        let mut decisions: Vec<_> = tables
            .decisions
            .values()
            .filter(|d| d.task_id == task_id)
            .cloned()
            .collect();
        decisions.sort_by_key(|d| d.created_at);
        Ok(decisions)
    }

    async fn add_signer(&self, id: Uuid, signer: &AgentId) -> DomainResult<()> {
        let signer = signer.clone();
        self.with_decision(id, move |d| {
            if !d.signers.contains(&signer) {
                d.signers.push(signer);
            }
        })
        .await
    }

    async fn add_vetoer(&self, id: Uuid, vetoer: &AgentId) -> DomainResult<()> {
        let vetoer = vetoer.clone();
        self.with_decision(id, move |d| {
            if !d.vetoers.contains(&vetoer) {
                d.vetoers.push(vetoer);
            }
        })
        .await
    }

    async fn update_status(&self, id: Uuid, status: DecisionStatus) -> DomainResult<()> {
        self.with_decision(id, move |d| d.status = status).await
    }

    async fn approve(&self, id: Uuid, approved_at: DateTime<Utc>) -> DomainResult<()> {
        self.with_decision(id, move |d| {
            d.status = DecisionStatus::Approved;
            d.approved_at = Some(approved_at);
        })
        .await
    }

    async fn insert_audit(&self, record: &AuditRecord) -> DomainResult<()> {
        self.tables.write().await.audits.push(record.clone());
        Ok(())
    }

    async fn list_audits(&self, filter: AuditFilter) -> DomainResult<Vec<AuditRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .audits
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert_election(&self, result: &ElectionResult) -> DomainResult<()> {
        self.tables.write().await.elections.push(result.clone());
        Ok(())
    }

    async fn list_elections(&self, task_id: &str) -> DomainResult<Vec<ElectionResult>> {
        let tables = self.tables.read().await;
        let mut results: Vec<_> = tables
            .elections
            .iter()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        results.sort_by_key(|e| e.round);
        Ok(results)
    }

    async fn insert_message(&self, message: &Message) -> DomainResult<()> {
        self.tables.write().await.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, task_id: &str) -> DomainResult<Vec<Message>> {
        Ok(self
            .tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.task_id == task_id)
            .cloned()
            .collect())
    }
}
