use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::agent::Layer;
use super::decision::DecisionType;
use super::recovery::Severity;

/// Main configuration structure for Cadence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Heartbeat clock configuration
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Message bus configuration
    #[serde(default)]
    pub bus: BusConfig,

    /// Decision engine configuration
    #[serde(default)]
    pub governance: GovernanceConfig,

    /// Performance score weights used by elections
    #[serde(default)]
    pub election: ScoreWeights,

    /// Thresholds for warnings, demotions, dismissals and promotions
    #[serde(default)]
    pub accountability: AccountabilityPolicy,

    /// Failure recovery configuration
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Team roster used by the simulator
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

/// Heartbeat clock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HeartbeatConfig {
    /// Tick interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

const fn default_interval_ms() -> u64 {
    4000
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Message bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BusConfig {
    /// Hard capacity of each agent inbox
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Content larger than this many serialized bytes is compressed
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold_bytes: usize,

    /// Write accepted messages to the repository when one is attached
    #[serde(default = "default_true")]
    pub persist_messages: bool,

    /// Capacity of the overflow event broadcast channel
    #[serde(default = "default_overflow_capacity")]
    pub overflow_channel_capacity: usize,
}

const fn default_max_queue_size() -> usize {
    100
}

const fn default_compression_threshold() -> usize {
    1024
}

const fn default_true() -> bool {
    true
}

const fn default_overflow_capacity() -> usize {
    256
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            compression_threshold_bytes: default_compression_threshold(),
            persist_messages: true,
            overflow_channel_capacity: default_overflow_capacity(),
        }
    }
}

/// Required signer counts per decision type.
///
/// A type without an explicit threshold falls back to `default_threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignatureConfig {
    #[serde(default = "default_signature_threshold")]
    pub default_threshold: usize,
    #[serde(default)]
    pub task_allocation: Option<usize>,
    #[serde(default)]
    pub resource_adjustment: Option<usize>,
    #[serde(default)]
    pub technical_proposal: Option<usize>,
    #[serde(default)]
    pub milestone_confirmation: Option<usize>,
    #[serde(default)]
    pub agent_replacement: Option<usize>,
}

const fn default_signature_threshold() -> usize {
    1
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_signature_threshold(),
            task_allocation: Some(1),
            resource_adjustment: Some(2),
            technical_proposal: Some(2),
            milestone_confirmation: Some(2),
            agent_replacement: Some(2),
        }
    }
}

impl SignatureConfig {
    /// Number of distinct signatures that approves a decision of this type.
    pub fn threshold_for(&self, decision_type: DecisionType) -> usize {
        let explicit = match decision_type {
            DecisionType::TaskAllocation => self.task_allocation,
            DecisionType::ResourceAdjustment => self.resource_adjustment,
            DecisionType::TechnicalProposal => self.technical_proposal,
            DecisionType::MilestoneConfirmation => self.milestone_confirmation,
            DecisionType::AgentReplacement => self.agent_replacement,
        };
        explicit.unwrap_or(self.default_threshold)
    }

    /// Every threshold, explicit or defaulted.
    pub fn all_thresholds(&self) -> impl Iterator<Item = (DecisionType, usize)> + '_ {
        [
            DecisionType::TaskAllocation,
            DecisionType::ResourceAdjustment,
            DecisionType::TechnicalProposal,
            DecisionType::MilestoneConfirmation,
            DecisionType::AgentReplacement,
        ]
        .into_iter()
        .map(|t| (t, self.threshold_for(t)))
    }
}

/// Decision engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GovernanceConfig {
    #[serde(default)]
    pub signature: SignatureConfig,

    /// Seconds between signature reminders
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,

    /// Seconds before a pending decision is rejected
    #[serde(default = "default_signature_timeout_secs")]
    pub signature_timeout_secs: u64,

    /// Heartbeats between periodic elections (0 disables them)
    #[serde(default = "default_election_interval")]
    pub election_interval_heartbeats: u64,
}

const fn default_reminder_interval_secs() -> u64 {
    60
}

const fn default_signature_timeout_secs() -> u64 {
    300
}

const fn default_election_interval() -> u64 {
    15
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            signature: SignatureConfig::default(),
            reminder_interval_secs: default_reminder_interval_secs(),
            signature_timeout_secs: default_signature_timeout_secs(),
            election_interval_heartbeats: default_election_interval(),
        }
    }
}

/// Weights of the performance score components. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoreWeights {
    #[serde(default = "default_success_weight")]
    pub success_rate: f64,
    #[serde(default = "default_responsiveness_weight")]
    pub responsiveness: f64,
    #[serde(default = "default_reliability_weight")]
    pub reliability: f64,
    /// Average task duration that earns full responsiveness
    #[serde(default = "default_target_duration_ms")]
    pub target_task_duration_ms: f64,
}

const fn default_success_weight() -> f64 {
    0.4
}

const fn default_responsiveness_weight() -> f64 {
    0.3
}

const fn default_reliability_weight() -> f64 {
    0.3
}

const fn default_target_duration_ms() -> f64 {
    60_000.0
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            success_rate: default_success_weight(),
            responsiveness: default_responsiveness_weight(),
            reliability: default_reliability_weight(),
            target_task_duration_ms: default_target_duration_ms(),
        }
    }
}

/// Accountability thresholds consulted by elections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AccountabilityPolicy {
    /// Warnings at which an agent is demoted
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: u32,
    /// Warnings at which an agent is dismissed
    #[serde(default = "default_dismissal_warnings")]
    pub dismissal_warning_threshold: u32,
    /// Scores below this earn a warning
    #[serde(default = "default_warning_score")]
    pub warning_score: f64,
    /// Scores below this earn a demotion
    #[serde(default = "default_demotion_score")]
    pub demotion_score: f64,
    /// Scores below this earn a dismissal
    #[serde(default = "default_dismissal_score")]
    pub dismissal_score: f64,
    /// Scores at or above this earn a promotion
    #[serde(default = "default_promotion_score")]
    pub promotion_score: f64,
}

const fn default_warning_threshold() -> u32 {
    3
}

const fn default_dismissal_warnings() -> u32 {
    5
}

const fn default_warning_score() -> f64 {
    60.0
}

const fn default_demotion_score() -> f64 {
    40.0
}

const fn default_dismissal_score() -> f64 {
    20.0
}

const fn default_promotion_score() -> f64 {
    85.0
}

impl Default for AccountabilityPolicy {
    fn default() -> Self {
        Self {
            warning_threshold: default_warning_threshold(),
            dismissal_warning_threshold: default_dismissal_warnings(),
            warning_score: default_warning_score(),
            demotion_score: default_demotion_score(),
            dismissal_score: default_dismissal_score(),
            promotion_score: default_promotion_score(),
        }
    }
}

/// A value per error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PerSeverity<T> {
    pub low: T,
    pub medium: T,
    pub high: T,
    pub critical: T,
}

impl<T: Copy> PerSeverity<T> {
    pub fn get(&self, severity: Severity) -> T {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

/// Failure recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecoveryConfig {
    /// Retry budget per severity
    #[serde(default = "default_max_retries")]
    pub max_retries: PerSeverity<u32>,

    /// Base backoff delay per severity, doubled per attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: PerSeverity<u64>,

    /// How long peer takeover waits for the peer's answer
    #[serde(default = "default_peer_response_timeout_ms")]
    pub peer_response_timeout_ms: u64,
}

const fn default_max_retries() -> PerSeverity<u32> {
    PerSeverity {
        low: 3,
        medium: 2,
        high: 1,
        critical: 0,
    }
}

const fn default_base_delay_ms() -> PerSeverity<u64> {
    PerSeverity {
        low: 1000,
        medium: 5000,
        high: 10_000,
        critical: 0,
    }
}

const fn default_peer_response_timeout_ms() -> u64 {
    10_000
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            peer_response_timeout_ms: default_peer_response_timeout_ms(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Enable stdout logging
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Log rotation policy
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file; in-memory repositories are used when unset
    #[serde(default)]
    pub path: Option<String>,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

/// One roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentSpec {
    pub id: String,
    pub layer: Layer,
    #[serde(default)]
    pub supervisor: Option<String>,
}
