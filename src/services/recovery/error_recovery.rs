//! Error classification and retry planning.

use std::time::Duration;

use crate::domain::models::{AgentId, ErrorContext, RecoveryAction, RecoveryConfig, Severity};

const CRITICAL_KEYWORDS: &[&str] = &[
    "unauthorized",
    "auth",
    "permission",
    "api key",
    "api-key",
    "api_key",
    "apikey",
    "forbidden",
];

const HIGH_KEYWORDS: &[&str] = &[
    "timeout",
    "timed out",
    "connection",
    "network",
    "econnrefused",
    "econnreset",
    "etimedout",
];

const MEDIUM_KEYWORDS: &[&str] = &["enoent", "no such file", "file", "syntax", "parse"];

/// Maps failures to a severity and decides between retry and escalation.
#[derive(Debug, Clone, Default)]
pub struct ErrorRecoveryManager {
    config: RecoveryConfig,
}

impl ErrorRecoveryManager {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Case-insensitive keyword classification of an error message.
    pub fn classify_error(error: &str) -> Severity {
        let lower = error.to_lowercase();
        let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

        if has_any(CRITICAL_KEYWORDS) {
            Severity::Critical
        } else if has_any(HIGH_KEYWORDS) {
            Severity::High
        } else if has_any(MEDIUM_KEYWORDS) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Build a classified context for a failure.
    pub fn context(
        error: impl Into<String>,
        agent_id: impl Into<AgentId>,
        task_id: impl Into<String>,
        attempt_count: u32,
    ) -> ErrorContext {
        let error = error.into();
        ErrorContext {
            severity: Self::classify_error(&error),
            error,
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            attempt_count,
        }
    }

    pub fn max_retries(&self, severity: Severity) -> u32 {
        self.config.max_retries.get(severity)
    }

    /// `base[severity] * 2^attempt`, saturating.
    pub fn backoff_delay(&self, severity: Severity, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms.get(severity);
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor))
    }

    /// Decide what to do about a failure without waiting.
    pub fn plan(&self, ctx: &ErrorContext) -> RecoveryAction {
        if ctx.attempt_count < self.max_retries(ctx.severity) {
            return RecoveryAction::Retry {
                delay: self.backoff_delay(ctx.severity, ctx.attempt_count),
            };
        }
        match ctx.severity {
            Severity::Critical => RecoveryAction::EscalateToTop,
            Severity::High => RecoveryAction::PeerTakeover,
            Severity::Medium | Severity::Low => RecoveryAction::EscalateToSupervisor,
        }
    }

    /// Plan recovery. For retries, waits out the backoff before returning.
    pub async fn handle_error(&self, ctx: &ErrorContext) -> RecoveryAction {
        let action = self.plan(ctx);
        tracing::warn!(
            agent_id = %ctx.agent_id,
            task_id = %ctx.task_id,
            severity = %ctx.severity,
            attempt = ctx.attempt_count,
            action = %action,
            error = %ctx.error,
            "Handling agent error"
        );
        if let RecoveryAction::Retry { delay } = &action {
            tokio::time::sleep(*delay).await;
        }
        action
    }
}
