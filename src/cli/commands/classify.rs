//! `cadence classify`: severity and recovery plan for an error message.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, RecoveryAction, Severity};
use crate::services::{ErrorRecoveryManager, SupervisorEscalationHandler};

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Error message to classify
    pub error: String,

    /// Attempts already made
    #[arg(short, long, default_value_t = 0)]
    pub attempt: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyOutput {
    pub error: String,
    pub severity: Severity,
    pub attempt: u32,
    pub max_retries: u32,
    pub action: RecoveryAction,
    pub suggestion: &'static str,
}

impl CommandOutput for ClassifyOutput {
    fn to_human(&self) -> String {
        [
            format!("Severity: {}", self.severity),
            format!("Retries allowed: {} (attempt {})", self.max_retries, self.attempt),
            format!("Action: {}", self.action),
            format!("Suggestion: {}", self.suggestion),
        ]
        .join("\n")
    }
}

/// Build the plan without sleeping or sending anything.
pub fn classify(args: &ClassifyArgs, config: &Config) -> ClassifyOutput {
    let manager = ErrorRecoveryManager::new(config.recovery.clone());
    let ctx = ErrorRecoveryManager::context(&args.error, "cli", "cli", args.attempt);
    ClassifyOutput {
        error: args.error.clone(),
        severity: ctx.severity,
        attempt: args.attempt,
        max_retries: manager.max_retries(ctx.severity),
        action: manager.plan(&ctx),
        suggestion: SupervisorEscalationHandler::suggest_remediation(&args.error),
    }
}

pub fn execute(args: &ClassifyArgs, config: &Config, json: bool) -> Result<()> {
    output(&classify(args, config), json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_plans_first_attempt() {
        let args = ClassifyArgs {
            error: "ECONNREFUSED: connect failed".to_string(),
            attempt: 0,
        };
        let result = classify(&args, &Config::default());
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.max_retries, 1);
        assert_eq!(
            result.action,
            RecoveryAction::Retry { delay: Duration::from_millis(10_000) }
        );
        assert!(result.to_human().contains("Severity: HIGH"));
    }

    #[test]
    fn test_classify_exhausted_retries() {
        let args = ClassifyArgs {
            error: "ECONNREFUSED".to_string(),
            attempt: 1,
        };
        let result = classify(&args, &Config::default());
        assert_eq!(result.action, RecoveryAction::PeerTakeover);
        assert_eq!(result.to_json()["action"]["type"], "peer_takeover");
    }
}
