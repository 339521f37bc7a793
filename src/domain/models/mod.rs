pub mod agent;
pub mod audit;
pub mod config;
pub mod decision;
pub mod election;
pub mod message;
pub mod recovery;

pub use agent::{AgentId, AgentMetrics, AgentRecord, AgentStatus, Layer};
pub use audit::{AuditEventType, AuditRecord};
pub use config::{
    AccountabilityPolicy, AgentSpec, BusConfig, Config, DatabaseConfig, GovernanceConfig,
    HeartbeatConfig, LogFormat, LoggingConfig, PerSeverity, RecoveryConfig, RotationPolicy,
    ScoreWeights, SignatureConfig,
};
pub use decision::{Decision, DecisionProposal, DecisionStatus, DecisionType};
pub use election::{ElectionAction, ElectionResult, PerformanceScore};
pub use message::{Message, MessagePriority, MessageType, Recipient};
pub use recovery::{ErrorContext, RecoveryAction, Severity};
