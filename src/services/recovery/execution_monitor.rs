//! Execution deadlines.
//!
//! Each monitored execution gets a one-shot timer. When it fires, the
//! caller's callback runs and a HIGH-severity timeout error is reported to
//! the recovery manager in the background.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error_recovery::ErrorRecoveryManager;
use crate::domain::models::{AgentId, ErrorContext, RecoveryAction, Severity};

/// Reported once the recovery manager has planned a timed-out execution.
#[derive(Debug, Clone)]
pub struct TimeoutOutcome {
    pub execution_id: String,
    pub context: ErrorContext,
    pub action: RecoveryAction,
}

struct Execution {
    agent_id: AgentId,
    started_at: Instant,
    handle: JoinHandle<()>,
}

type Executions = Arc<Mutex<HashMap<String, Execution>>>;

pub struct ExecutionMonitor {
    recovery: Arc<ErrorRecoveryManager>,
    executions: Executions,
    outcome_tx: Option<mpsc::Sender<TimeoutOutcome>>,
}

impl ExecutionMonitor {
    pub fn new(recovery: Arc<ErrorRecoveryManager>) -> Self {
        Self {
            recovery,
            executions: Arc::new(Mutex::new(HashMap::new())),
            outcome_tx: None,
        }
    }

    /// Forward recovery decisions for timed-out executions to a channel.
    pub fn with_outcome_sender(mut self, tx: mpsc::Sender<TimeoutOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    /// Arm a deadline for an execution. Re-monitoring an id replaces its timer.
    pub fn start_monitoring<F>(
        &self,
        execution_id: impl Into<String>,
        agent_id: impl Into<AgentId>,
        task_id: impl Into<String>,
        timeout: Duration,
        on_timeout: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        let execution_id = execution_id.into();
        let agent_id = agent_id.into();
        let task_id = task_id.into();

        let executions = self.executions.clone();
        let recovery = self.recovery.clone();
        let outcome_tx = self.outcome_tx.clone();
        let id = execution_id.clone();
        let agent = agent_id.clone();

        let mut guard = self.executions.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            executions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);

            tracing::warn!(
                execution_id = %id,
                agent_id = %agent,
                timeout_ms = timeout.as_millis() as u64,
                "Execution timed out"
            );
            on_timeout();

            let context = ErrorContext {
                error: format!("Execution timeout after {}ms", timeout.as_millis()),
                agent_id: agent,
                task_id,
                attempt_count: 0,
                severity: Severity::High,
            };
            tokio::spawn(async move {
                let action = recovery.handle_error(&context).await;
                if let Some(tx) = outcome_tx {
                    let outcome = TimeoutOutcome {
                        execution_id: id,
                        context,
                        action,
                    };
                    if tx.send(outcome).await.is_err() {
                        tracing::debug!("Timeout outcome receiver dropped");
                    }
                }
            });
        });

        let execution = Execution {
            agent_id,
            started_at: Instant::now(),
            handle,
        };
        if let Some(previous) = guard.insert(execution_id, execution) {
            previous.handle.abort();
        }
    }

    /// Cancel an execution's deadline. Returns whether it was monitored.
    pub fn stop_monitoring(&self, execution_id: &str) -> bool {
        let removed = self
            .executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(execution_id);
        match removed {
            Some(execution) => {
                execution.handle.abort();
                tracing::debug!(
                    execution_id,
                    agent_id = %execution.agent_id,
                    elapsed_ms = execution.started_at.elapsed().as_millis() as u64,
                    "Execution finished in time"
                );
                true
            }
            None => false,
        }
    }

    pub fn is_monitoring(&self, execution_id: &str) -> bool {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(execution_id)
    }

    /// Time since monitoring started for an execution.
    pub fn elapsed(&self, execution_id: &str) -> Option<Duration> {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(execution_id)
            .map(|e| e.started_at.elapsed())
    }

    pub fn active_count(&self) -> usize {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cancel every deadline. Returns how many were armed.
    pub fn cleanup(&self) -> usize {
        let drained: Vec<_> = self
            .executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, execution) in &drained {
            execution.handle.abort();
        }
        drained.len()
    }
}

impl Drop for ExecutionMonitor {
    fn drop(&mut self) {
        self.cleanup();
    }
}
