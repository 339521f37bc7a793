use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid heartbeat interval: {0}ms. Must be positive")]
    InvalidHeartbeatInterval(u64),

    #[error("Invalid max_queue_size: {0}. Must be at least 1")]
    InvalidQueueSize(usize),

    #[error("Invalid signature threshold for {0}: must be at least 1")]
    InvalidThreshold(String),

    #[error("Invalid election weights: they sum to {0}, expected 1.0")]
    InvalidWeights(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Duplicate agent id: {0}")]
    DuplicateAgent(String),

    #[error("Agent {agent} names unknown supervisor {supervisor}")]
    UnknownSupervisor { agent: String, supervisor: String },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .cadence/config.yaml (project config)
    /// 3. .cadence/local.yaml (local overrides, optional)
    /// 4. Environment variables (CADENCE_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".cadence/config.yaml"))
            .merge(Yaml::file(".cadence/local.yaml"))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.heartbeat.interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeatInterval(0));
        }

        if config.bus.max_queue_size == 0 {
            return Err(ConfigError::InvalidQueueSize(0));
        }
        if config.bus.overflow_channel_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "bus.overflow_channel_capacity must be at least 1".to_string(),
            ));
        }

        for (decision_type, threshold) in config.governance.signature.all_thresholds() {
            if threshold == 0 {
                return Err(ConfigError::InvalidThreshold(decision_type.to_string()));
            }
        }
        if config.governance.reminder_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "governance.reminder_interval_secs must be positive".to_string(),
            ));
        }
        if config.governance.election_interval_heartbeats == 0 {
            return Err(ConfigError::ValidationFailed(
                "governance.election_interval_heartbeats must be positive".to_string(),
            ));
        }

        let weights = &config.election;
        let sum = weights.success_rate + weights.responsiveness + weights.reliability;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeights(sum));
        }
        if weights.target_task_duration_ms <= 0.0 {
            return Err(ConfigError::ValidationFailed(
                "election.target_task_duration_ms must be positive".to_string(),
            ));
        }

        let policy = &config.accountability;
        if !(policy.dismissal_score <= policy.demotion_score
            && policy.demotion_score <= policy.warning_score
            && policy.warning_score <= policy.promotion_score)
        {
            return Err(ConfigError::ValidationFailed(
                "accountability scores must satisfy dismissal <= demotion <= warning <= promotion"
                    .to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.database.path.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let mut ids = HashSet::new();
        for agent in &config.agents {
            if !ids.insert(agent.id.as_str()) {
                return Err(ConfigError::DuplicateAgent(agent.id.clone()));
            }
        }
        for agent in &config.agents {
            if let Some(supervisor) = &agent.supervisor {
                if !ids.contains(supervisor.as_str()) {
                    return Err(ConfigError::UnknownSupervisor {
                        agent: agent.id.clone(),
                        supervisor: supervisor.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
