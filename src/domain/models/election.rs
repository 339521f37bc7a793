use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::agent::{AgentId, Layer};

/// Outcome applied to an evaluated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionAction {
    Retain,
    Warn,
    Promote,
    Demote,
    Dismiss,
}

impl ElectionAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retain => "retain",
            Self::Warn => "warn",
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Dismiss => "dismiss",
        }
    }

    /// Past-tense label recorded as the election result.
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Retain => "retained",
            Self::Warn => "warned",
            Self::Promote => "promoted",
            Self::Demote => "demoted",
            Self::Dismiss => "dismissed",
        }
    }
}

impl fmt::Display for ElectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElectionAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retain" => Ok(Self::Retain),
            "warn" => Ok(Self::Warn),
            "promote" => Ok(Self::Promote),
            "demote" => Ok(Self::Demote),
            "dismiss" => Ok(Self::Dismiss),
            _ => Err(anyhow::anyhow!("Invalid election action: {s}")),
        }
    }
}

/// Breakdown of an agent's performance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceScore {
    /// Fraction of finished tasks that succeeded, 0.0 - 1.0.
    pub success_rate: f64,
    /// Task-duration component, 0.0 - 1.0.
    pub responsiveness: f64,
    /// Heartbeat-response component, 0.0 - 1.0.
    pub reliability: f64,
    /// Weighted total, 0 - 100.
    pub overall_score: f64,
}

/// Record of one agent's evaluation in one election round. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResult {
    pub id: Uuid,
    pub task_id: String,
    pub round: u64,
    pub layer: Layer,
    pub action: ElectionAction,
    pub target_agent_id: AgentId,
    pub votes: BTreeMap<AgentId, String>,
    pub score: f64,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}
