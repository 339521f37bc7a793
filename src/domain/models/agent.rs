use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of an agent on the bus (e.g. `"top-1"`, `"mid-backend"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Supervisory tier of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Top,
    Mid,
    Bottom,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Top, Layer::Mid, Layer::Bottom];
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "top"),
            Self::Mid => write!(f, "mid"),
            Self::Bottom => write!(f, "bottom"),
        }
    }
}

impl FromStr for Layer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "mid" => Ok(Self::Mid),
            "bottom" => Ok(Self::Bottom),
            _ => Err(anyhow::anyhow!("Invalid layer: {s}")),
        }
    }
}

/// Agent status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Failed,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Failed => write!(f, "failed"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for AgentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "failed" => Ok(Self::Failed),
            "offline" => Ok(Self::Offline),
            _ => Err(anyhow::anyhow!("Invalid agent status: {s}")),
        }
    }
}

/// Counters each agent keeps about its own work.
///
/// Updated only by the agent itself; election and accountability read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    /// Average task duration in milliseconds.
    pub average_task_duration: f64,
    pub messages_processed: u64,
    pub heartbeats_responded: u64,
    pub heartbeats_missed: u64,
    pub warnings_received: u32,
}

impl AgentMetrics {
    /// Record a finished task and fold its duration into the running average.
    pub fn record_task(&mut self, succeeded: bool, duration_ms: f64) {
        let previous = self.tasks_completed + self.tasks_failed;
        if succeeded {
            self.tasks_completed += 1;
        } else {
            self.tasks_failed += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = previous as f64;
        self.average_task_duration = (self.average_task_duration * n + duration_ms) / (n + 1.0);
    }
}

/// An agent as seen by the registry collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub layer: Layer,
    pub status: AgentStatus,
    pub supervisor: Option<AgentId>,
    #[serde(default)]
    pub metrics: AgentMetrics,
}

impl AgentRecord {
    /// Create an idle agent with empty metrics.
    pub fn new(id: impl Into<AgentId>, layer: Layer) -> Self {
        Self {
            id: id.into(),
            layer,
            status: AgentStatus::Idle,
            supervisor: None,
            metrics: AgentMetrics::default(),
        }
    }

    pub fn with_supervisor(mut self, supervisor: impl Into<AgentId>) -> Self {
        self.supervisor = Some(supervisor.into());
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_status_serialization() {
        assert_eq!(AgentStatus::Idle.to_string(), "idle");
        assert_eq!(AgentStatus::Busy.to_string(), "busy");
        assert_eq!(AgentStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_agent_status_from_str() {
        assert_eq!("idle".parse::<AgentStatus>().unwrap(), AgentStatus::Idle);
        assert_eq!("IDLE".parse::<AgentStatus>().unwrap(), AgentStatus::Idle);
        assert!("sleeping".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn test_layer_round_trip() {
        for layer in Layer::ALL {
            assert_eq!(layer.to_string().parse::<Layer>().unwrap(), layer);
        }
        let json = serde_json::to_string(&Layer::Mid).unwrap();
        assert_eq!(json, "\"mid\"");
    }

    #[test]
    fn test_record_task_running_average() {
        let mut metrics = AgentMetrics::default();
        metrics.record_task(true, 100.0);
        metrics.record_task(false, 300.0);
        assert_eq!(metrics.tasks_completed, 1);
        assert_eq!(metrics.tasks_failed, 1);
        assert!((metrics.average_task_duration - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_wire_shape() {
        let value = serde_json::to_value(AgentMetrics::default()).unwrap();
        assert!(value.get("tasksCompleted").is_some());
        assert!(value.get("heartbeatsMissed").is_some());
    }
}
