//! Message model: the wire envelope every component exchanges over the bus.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::agent::AgentId;

/// Wire literal addressing every agent except the sender.
pub const BROADCAST: &str = "broadcast";
/// Wire literal addressing the kernel itself.
pub const SYSTEM: &str = "system";

/// Closed set of message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    TaskAssign,
    ProgressReport,
    SignatureRequest,
    SignatureApprove,
    SignatureVeto,
    HeartbeatAck,
    ErrorReport,
    PeerHelpRequest,
    PeerHelpResponse,
    IssueEscalation,
    ElectionResult,
    AccountabilityWarning,
}

impl MessageType {
    pub const ALL: [MessageType; 12] = [
        Self::TaskAssign,
        Self::ProgressReport,
        Self::SignatureRequest,
        Self::SignatureApprove,
        Self::SignatureVeto,
        Self::HeartbeatAck,
        Self::ErrorReport,
        Self::PeerHelpRequest,
        Self::PeerHelpResponse,
        Self::IssueEscalation,
        Self::ElectionResult,
        Self::AccountabilityWarning,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAssign => "TASK_ASSIGN",
            Self::ProgressReport => "PROGRESS_REPORT",
            Self::SignatureRequest => "SIGNATURE_REQUEST",
            Self::SignatureApprove => "SIGNATURE_APPROVE",
            Self::SignatureVeto => "SIGNATURE_VETO",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
            Self::ErrorReport => "ERROR_REPORT",
            Self::PeerHelpRequest => "PEER_HELP_REQUEST",
            Self::PeerHelpResponse => "PEER_HELP_RESPONSE",
            Self::IssueEscalation => "ISSUE_ESCALATION",
            Self::ElectionResult => "ELECTION_RESULT",
            Self::AccountabilityWarning => "ACCOUNTABILITY_WARNING",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown message type: {s}"))
    }
}

/// Delivery priority. Serialized as its numeric level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessagePriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
    Urgent = 3,
}

impl TryFrom<u8> for MessagePriority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Normal),
            2 => Ok(Self::High),
            3 => Ok(Self::Urgent),
            other => Err(format!("Unknown priority level: {other}")),
        }
    }
}

impl From<MessagePriority> for u8 {
    fn from(priority: MessagePriority) -> Self {
        priority as u8
    }
}

/// Destination of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    Agent(AgentId),
    Broadcast,
    System,
}

impl Recipient {
    pub fn agent(id: impl Into<AgentId>) -> Self {
        Self::Agent(id.into())
    }

    pub fn as_agent(&self) -> Option<&AgentId> {
        match self {
            Self::Agent(id) => Some(id),
            Self::Broadcast | Self::System => None,
        }
    }
}

impl From<String> for Recipient {
    fn from(s: String) -> Self {
        match s.as_str() {
            BROADCAST => Self::Broadcast,
            SYSTEM => Self::System,
            _ => Self::Agent(AgentId(s)),
        }
    }
}

impl From<Recipient> for String {
    fn from(r: Recipient) -> Self {
        match r {
            Recipient::Agent(id) => id.0,
            Recipient::Broadcast => BROADCAST.to_string(),
            Recipient::System => SYSTEM.to_string(),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "{id}"),
            Self::Broadcast => f.write_str(BROADCAST),
            Self::System => f.write_str(SYSTEM),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A single bus message.
///
/// Immutable once validated; owned by whichever queue currently holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub task_id: String,
    pub from: AgentId,
    pub to: Recipient,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub priority: MessagePriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(rename = "_compressed", default, skip_serializing_if = "is_false")]
    pub compressed: bool,
    #[serde(rename = "_originalSize", default, skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
}

impl Message {
    /// Build a message stamped with a fresh id and the current time.
    pub fn new(
        task_id: impl Into<String>,
        from: impl Into<AgentId>,
        to: Recipient,
        message_type: MessageType,
        content: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task_id.into(),
            from: from.into(),
            to,
            message_type,
            content,
            timestamp: Utc::now().timestamp_millis(),
            priority: MessagePriority::Normal,
            heartbeat_number: None,
            reply_to: None,
            compressed: false,
            original_size: None,
        }
    }

    pub fn with_priority(mut self, priority: MessagePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl ToString) -> Self {
        self.reply_to = Some(reply_to.to_string());
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: u64) -> Self {
        self.heartbeat_number = Some(heartbeat);
        self
    }

    /// Whether this message answers the request with the given id.
    pub fn is_reply_to(&self, request_id: Uuid) -> bool {
        self.reply_to
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok())
            .is_some_and(|r| r == request_id)
    }
}
