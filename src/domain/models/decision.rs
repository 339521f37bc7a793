use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::agent::AgentId;

/// Kind of governance decision; selects the signature threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    TaskAllocation,
    ResourceAdjustment,
    TechnicalProposal,
    MilestoneConfirmation,
    AgentReplacement,
}

impl DecisionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAllocation => "TASK_ALLOCATION",
            Self::ResourceAdjustment => "RESOURCE_ADJUSTMENT",
            Self::TechnicalProposal => "TECHNICAL_PROPOSAL",
            Self::MilestoneConfirmation => "MILESTONE_CONFIRMATION",
            Self::AgentReplacement => "AGENT_REPLACEMENT",
        }
    }
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TASK_ALLOCATION" => Ok(Self::TaskAllocation),
            "RESOURCE_ADJUSTMENT" => Ok(Self::ResourceAdjustment),
            "TECHNICAL_PROPOSAL" => Ok(Self::TechnicalProposal),
            "MILESTONE_CONFIRMATION" => Ok(Self::MilestoneConfirmation),
            "AGENT_REPLACEMENT" => Ok(Self::AgentReplacement),
            _ => Err(anyhow::anyhow!("Invalid decision type: {s}")),
        }
    }
}

/// Decision lifecycle. Transitions only leave `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Pending,
    Approved,
    Rejected,
}

impl DecisionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for DecisionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(anyhow::anyhow!("Invalid decision status: {s}")),
        }
    }
}

/// A governance proposal awaiting a quorum of signatures.
///
/// # Invariants
///
/// - `signers` and `vetoers` are subsets of `require_signers`.
/// - `status` only moves from `Pending` to `Approved` or `Rejected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: Uuid,
    pub task_id: String,
    pub proposer_id: AgentId,
    #[serde(rename = "type")]
    pub decision_type: DecisionType,
    pub content: Value,
    pub require_signers: Vec<AgentId>,
    pub signers: Vec<AgentId>,
    pub vetoers: Vec<AgentId>,
    pub status: DecisionStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Decision {
    /// Create a pending decision with no signatures.
    pub fn new(proposal: DecisionProposal) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: proposal.task_id,
            proposer_id: proposal.proposer_id,
            decision_type: proposal.decision_type,
            content: proposal.content,
            require_signers: proposal.require_signers,
            signers: Vec::new(),
            vetoers: Vec::new(),
            status: DecisionStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
        }
    }

    pub fn is_required_signer(&self, agent: &AgentId) -> bool {
        self.require_signers.contains(agent)
    }

    pub fn has_signed(&self, agent: &AgentId) -> bool {
        self.signers.contains(agent)
    }

    /// Required signers who have neither signed nor vetoed.
    pub fn outstanding_signers(&self) -> Vec<AgentId> {
        self.require_signers
            .iter()
            .filter(|s| !self.signers.contains(s) && !self.vetoers.contains(s))
            .cloned()
            .collect()
    }
}

/// Input to `propose_decision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionProposal {
    pub task_id: String,
    pub proposer_id: AgentId,
    #[serde(rename = "type")]
    pub decision_type: DecisionType,
    pub content: Value,
    pub require_signers: Vec<AgentId>,
    /// Overrides the engine's signature timeout for this decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl DecisionProposal {
    pub fn new(
        task_id: impl Into<String>,
        proposer_id: impl Into<AgentId>,
        decision_type: DecisionType,
        content: Value,
        require_signers: Vec<AgentId>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            proposer_id: proposer_id.into(),
            decision_type,
            content,
            require_signers,
            timeout_secs: None,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}
