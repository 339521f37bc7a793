use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::agent::AgentId;

/// Kind of audited governance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Propose,
    Sign,
    Approve,
    Veto,
    Timeout,
    Warning,
    Demotion,
    Dismissal,
    Promotion,
}

impl AuditEventType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Propose => "propose",
            Self::Sign => "sign",
            Self::Approve => "approve",
            Self::Veto => "veto",
            Self::Timeout => "timeout",
            Self::Warning => "warning",
            Self::Demotion => "demotion",
            Self::Dismissal => "dismissal",
            Self::Promotion => "promotion",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "propose" => Ok(Self::Propose),
            "sign" => Ok(Self::Sign),
            "approve" => Ok(Self::Approve),
            "veto" => Ok(Self::Veto),
            "timeout" => Ok(Self::Timeout),
            "warning" => Ok(Self::Warning),
            "demotion" => Ok(Self::Demotion),
            "dismissal" => Ok(Self::Dismissal),
            "promotion" => Ok(Self::Promotion),
            _ => Err(anyhow::anyhow!("Invalid audit event type: {s}")),
        }
    }
}

/// One accountability record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub task_id: String,
    pub event_type: AuditEventType,
    pub agent_id: AgentId,
    pub decision_id: Option<Uuid>,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(task_id: impl Into<String>, event_type: AuditEventType, agent_id: AgentId) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            event_type,
            agent_id,
            decision_id: None,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_decision(mut self, decision_id: Uuid) -> Self {
        self.decision_id = Some(decision_id);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
