//! SQLite implementation of the GovernanceRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentId, AuditRecord, Decision, DecisionStatus, ElectionResult, Message,
};
use crate::domain::ports::{AuditFilter, GovernanceRepository};

const SIGNER: &str = "signer";
const VETOER: &str = "vetoer";

#[derive(Clone)]
pub struct SqliteGovernanceRepository {
    pool: SqlitePool,
}

impl SqliteGovernanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn add_participant(&self, id: Uuid, agent: &AgentId, role: &str) -> DomainResult<()> {
        self.ensure_decision(id).await?;
        sqlx::query(
            "INSERT OR IGNORE INTO decision_participants (decision_id, agent_id, role) VALUES (?, ?, ?)"
        )
        .bind(id.to_string())
        .bind(agent.as_str())
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_decision(&self, id: Uuid) -> DomainResult<()> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM decisions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        exists.map(|_| ()).ok_or(DomainError::DecisionNotFound(id))
    }

    async fn hydrate(&self, row: DecisionRow) -> DomainResult<Decision> {
        let participants: Vec<(String, String)> = sqlx::query_as(
            "SELECT agent_id, role FROM decision_participants WHERE decision_id = ? ORDER BY seq"
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut decision = Decision::try_from(row)?;
        for (agent, role) in participants {
            match role.as_str() {
                SIGNER => decision.signers.push(AgentId(agent)),
                VETOER => decision.vetoers.push(AgentId(agent)),
                other => {
                    return Err(DomainError::SerializationError(format!(
                        "Invalid participant role: {other}"
                    )))
                }
            }
        }
        Ok(decision)
    }
}

#[async_trait]
impl GovernanceRepository for SqliteGovernanceRepository {
    async fn insert_decision(&self, decision: &Decision) -> DomainResult<()> {
        let content_json = serde_json::to_string(&decision.content)?;
        let signers_json = serde_json::to_string(&decision.require_signers)?;

        sqlx::query(
            r#"INSERT INTO decisions (id, task_id, proposer_id, decision_type, content,
               require_signers, status, created_at, approved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(decision.id.to_string())
        .bind(&decision.task_id)
        .bind(decision.proposer_id.as_str())
        .bind(decision.decision_type.as_str())
        .bind(&content_json)
        .bind(&signers_json)
        .bind(decision.status.to_string())
        .bind(decision.created_at.to_rfc3339())
        .bind(decision.approved_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        for signer in &decision.signers {
            self.add_participant(decision.id, signer, SIGNER).await?;
        }
        for vetoer in &decision.vetoers {
            self.add_participant(decision.id, vetoer, VETOER).await?;
        }
        Ok(())
    }

    async fn get_decision(&self, id: Uuid) -> DomainResult<Option<Decision>> {
        let row: Option<DecisionRow> = sqlx::query_as("SELECT * FROM decisions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_decisions(&self, task_id: &str) -> DomainResult<Vec<Decision>> {
        let rows: Vec<DecisionRow> = sqlx::query_as(
            "SELECT * FROM decisions WHERE task_id = ? ORDER BY created_at, rowid"
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        let mut decisions = Vec::with_capacity(rows.len());
        for row in rows {
            decisions.push(self.hydrate(row).await?);
        }
        Ok(decisions)
    }

    async fn add_signer(&self, id: Uuid, signer: &AgentId) -> DomainResult<()> {
        self.add_participant(id, signer, SIGNER).await
    }

    async fn add_vetoer(&self, id: Uuid, vetoer: &AgentId) -> DomainResult<()> {
        self.add_participant(id, vetoer, VETOER).await
    }

    async fn update_status(&self, id: Uuid, status: DecisionStatus) -> DomainResult<()> {
        let result = sqlx::query("UPDATE decisions SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DecisionNotFound(id));
        }
        Ok(())
    }

    async fn approve(&self, id: Uuid, approved_at: DateTime<Utc>) -> DomainResult<()> {
        let result = sqlx::query("UPDATE decisions SET status = ?, approved_at = ? WHERE id = ?")
            .bind(DecisionStatus::Approved.to_string())
            .bind(approved_at.to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::DecisionNotFound(id));
        }
        Ok(())
    }

    async fn insert_audit(&self, record: &AuditRecord) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO audits (id, task_id, event_type, agent_id, decision_id, reason, timestamp)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(record.id.to_string())
        .bind(&record.task_id)
        .bind(record.event_type.as_str())
        .bind(record.agent_id.as_str())
        .bind(record.decision_id.map(|d| d.to_string()))
        .bind(&record.reason)
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audits(&self, filter: AuditFilter) -> DomainResult<Vec<AuditRecord>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"SELECT id, task_id, event_type, agent_id, decision_id, reason, timestamp FROM audits
               WHERE (?1 IS NULL OR task_id = ?1)
                 AND (?2 IS NULL OR decision_id = ?2)
                 AND (?3 IS NULL OR agent_id = ?3)
                 AND (?4 IS NULL OR event_type = ?4)
               ORDER BY seq"#
        )
        .bind(filter.task_id)
        .bind(filter.decision_id.map(|d| d.to_string()))
        .bind(filter.agent_id.map(|a| a.0))
        .bind(filter.event_type.map(|e| e.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }

    async fn insert_election(&self, result: &ElectionResult) -> DomainResult<()> {
        let votes_json = serde_json::to_string(&result.votes)?;
        let round = i64::try_from(result.round)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO elections (id, task_id, round, layer, action, target_agent_id,
               votes, score, result, timestamp)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(result.id.to_string())
        .bind(&result.task_id)
        .bind(round)
        .bind(result.layer.to_string())
        .bind(result.action.as_str())
        .bind(result.target_agent_id.as_str())
        .bind(&votes_json)
        .bind(result.score)
        .bind(&result.result)
        .bind(result.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_elections(&self, task_id: &str) -> DomainResult<Vec<ElectionResult>> {
        let rows: Vec<ElectionRow> = sqlx::query_as(
            r#"SELECT id, task_id, round, layer, action, target_agent_id, votes, score, result, timestamp
               FROM elections WHERE task_id = ? ORDER BY round, seq"#
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ElectionResult::try_from).collect()
    }

    async fn insert_message(&self, message: &Message) -> DomainResult<()> {
        let body = serde_json::to_string(message)?;
        let heartbeat = message
            .heartbeat_number
            .map(i64::try_from)
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO messages (id, task_id, from_agent, to_agent, message_type, priority,
               heartbeat_number, timestamp, body)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(message.id.to_string())
        .bind(&message.task_id)
        .bind(message.from.as_str())
        .bind(message.to.to_string())
        .bind(message.message_type.as_str())
        .bind(i64::from(u8::from(message.priority)))
        .bind(heartbeat)
        .bind(message.timestamp)
        .bind(&body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_messages(&self, task_id: &str) -> DomainResult<Vec<Message>> {
        let bodies: Vec<(String,)> = sqlx::query_as(
            "SELECT body FROM messages WHERE task_id = ? ORDER BY seq"
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        bodies
            .into_iter()
            .map(|(body,)| serde_json::from_str(&body).map_err(DomainError::from))
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct DecisionRow {
    id: String,
    task_id: String,
    proposer_id: String,
    decision_type: String,
    content: String,
    require_signers: String,
    status: String,
    created_at: String,
    approved_at: Option<String>,
}

impl TryFrom<DecisionRow> for Decision {
    type Error = DomainError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        Ok(Decision {
            id: super::parse_uuid(&row.id)?,
            task_id: row.task_id,
            proposer_id: AgentId(row.proposer_id),
            decision_type: row
                .decision_type
                .parse()
                .map_err(|e: anyhow::Error| DomainError::SerializationError(e.to_string()))?,
            content: serde_json::from_str(&row.content)?,
            require_signers: serde_json::from_str(&row.require_signers)?,
            signers: Vec::new(),
            vetoers: Vec::new(),
            status: row
                .status
                .parse()
                .map_err(|e: anyhow::Error| DomainError::SerializationError(e.to_string()))?,
            created_at: super::parse_datetime(&row.created_at)?,
            approved_at: super::parse_optional_datetime(row.approved_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    task_id: String,
    event_type: String,
    agent_id: String,
    decision_id: Option<String>,
    reason: Option<String>,
    timestamp: String,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditRecord {
            id: super::parse_uuid(&row.id)?,
            task_id: row.task_id,
            event_type: row
                .event_type
                .parse()
                .map_err(|e: anyhow::Error| DomainError::SerializationError(e.to_string()))?,
            agent_id: AgentId(row.agent_id),
            decision_id: super::parse_optional_uuid(row.decision_id)?,
            reason: row.reason,
            timestamp: super::parse_datetime(&row.timestamp)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ElectionRow {
    id: String,
    task_id: String,
    round: i64,
    layer: String,
    action: String,
    target_agent_id: String,
    votes: String,
    score: f64,
    result: String,
    timestamp: String,
}

impl TryFrom<ElectionRow> for ElectionResult {
    type Error = DomainError;

    fn try_from(row: ElectionRow) -> Result<Self, Self::Error> {
        let votes: BTreeMap<AgentId, String> = serde_json::from_str(&row.votes)?;
        Ok(ElectionResult {
            id: super::parse_uuid(&row.id)?,
            task_id: row.task_id,
            round: u64::try_from(row.round)
                .map_err(|e| DomainError::SerializationError(e.to_string()))?,
            layer: row
                .layer
                .parse()
                .map_err(|e: anyhow::Error| DomainError::SerializationError(e.to_string()))?,
            action: row
                .action
                .parse()
                .map_err(|e: anyhow::Error| DomainError::SerializationError(e.to_string()))?,
            target_agent_id: AgentId(row.target_agent_id),
            votes,
            score: row.score,
            result: row.result,
            timestamp: super::parse_datetime(&row.timestamp)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{
        AuditEventType, DecisionProposal, DecisionType, ElectionAction, Layer, MessageType,
        Recipient,
    };
    use serde_json::json;

    async fn repo() -> SqliteGovernanceRepository {
        SqliteGovernanceRepository::new(create_migrated_test_pool().await.unwrap())
    }

    fn decision() -> Decision {
        Decision::new(DecisionProposal::new(
            "task-1",
            "mid-1",
            DecisionType::TechnicalProposal,
            json!({"design": "event sourcing"}),
            vec![AgentId::from("top-1"), AgentId::from("top-2")],
        ))
    }

    #[tokio::test]
    async fn test_decision_lifecycle() {
        let repo = repo().await;
        let decision = decision();
        repo.insert_decision(&decision).await.unwrap();

        repo.add_signer(decision.id, &AgentId::from("top-2")).await.unwrap();
        repo.add_signer(decision.id, &AgentId::from("top-1")).await.unwrap();
        repo.add_signer(decision.id, &AgentId::from("top-1")).await.unwrap();
        let approved_at = Utc::now();
        repo.approve(decision.id, approved_at).await.unwrap();

        let stored = repo.get_decision(decision.id).await.unwrap().unwrap();
        assert_eq!(stored.signers, vec![AgentId::from("top-2"), AgentId::from("top-1")]);
        assert_eq!(stored.status, DecisionStatus::Approved);
        assert_eq!(stored.content, json!({"design": "event sourcing"}));
        assert_eq!(
            stored.approved_at.map(|t| t.timestamp_millis()),
            Some(approved_at.timestamp_millis())
        );
        assert_eq!(repo.list_decisions("task-1").await.unwrap().len(), 1);
        assert!(repo.list_decisions("task-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_decision() {
        let repo = repo().await;
        let id = Uuid::new_v4();
        assert!(repo.get_decision(id).await.unwrap().is_none());
        assert!(matches!(
            repo.add_signer(id, &AgentId::from("top-1")).await,
            Err(DomainError::DecisionNotFound(_))
        ));
        assert!(matches!(
            repo.update_status(id, DecisionStatus::Rejected).await,
            Err(DomainError::DecisionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_audit_filtering_keeps_insertion_order() {
        let repo = repo().await;
        let decision = decision();
        repo.insert_decision(&decision).await.unwrap();

        let propose = AuditRecord::new("task-1", AuditEventType::Propose, AgentId::from("mid-1"))
            .for_decision(decision.id);
        let veto = AuditRecord::new("task-1", AuditEventType::Veto, AgentId::from("top-1"))
            .for_decision(decision.id)
            .with_reason("too risky");
        let warning = AuditRecord::new("task-1", AuditEventType::Warning, AgentId::from("bottom-1"));
        for record in [&propose, &veto, &warning] {
            repo.insert_audit(record).await.unwrap();
        }

        let by_decision = repo
            .list_audits(AuditFilter {
                decision_id: Some(decision.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_decision.len(), 2);
        assert_eq!(by_decision[0].event_type, AuditEventType::Propose);
        assert_eq!(by_decision[1].reason.as_deref(), Some("too risky"));

        let warnings = repo
            .list_audits(AuditFilter {
                event_type: Some(AuditEventType::Warning),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(repo.list_audits(AuditFilter::default()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_elections_sorted_by_round() {
        let repo = repo().await;
        for round in [2u64, 1] {
            let result = ElectionResult {
                id: Uuid::new_v4(),
                task_id: "task-1".to_string(),
                round,
                layer: Layer::Bottom,
                action: ElectionAction::Retain,
                target_agent_id: AgentId::from("bottom-1"),
                votes: BTreeMap::from([(AgentId::from("bottom-2"), "retain".to_string())]),
                score: 72.5,
                result: "retained".to_string(),
                timestamp: Utc::now(),
            };
            repo.insert_election(&result).await.unwrap();
        }

        let results = repo.list_elections("task-1").await.unwrap();
        assert_eq!(results.iter().map(|r| r.round).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(results[0].votes.len(), 1);
    }

    #[tokio::test]
    async fn test_message_history() {
        let repo = repo().await;
        let message = Message::new(
            "task-1",
            "mid-1",
            Recipient::Broadcast,
            MessageType::ProgressReport,
            json!({"progress": 40}),
        )
        .with_heartbeat(7);
        repo.insert_message(&message).await.unwrap();

        let history = repo.list_messages("task-1").await.unwrap();
        assert_eq!(history, vec![message]);
    }
}
