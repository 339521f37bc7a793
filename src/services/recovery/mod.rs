//! Failure recovery - classification, retry, takeover, escalation.
//!
//! - **error_recovery**: severity classification and retry/backoff planning
//! - **execution_monitor**: per-execution deadlines reported as HIGH errors
//! - **peer_takeover**: hand a failed agent's task to an idle peer
//! - **supervisor_escalation**: route failures to supervisors or the top layer

mod error_recovery;
mod execution_monitor;
mod peer_takeover;
mod supervisor_escalation;

pub use error_recovery::ErrorRecoveryManager;
pub use execution_monitor::{ExecutionMonitor, TimeoutOutcome};
pub use peer_takeover::{PeerTakeoverCoordinator, TakeoverOutcome};
pub use supervisor_escalation::{EscalationOutcome, SupervisorEscalationHandler};

use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentId, ErrorContext, RecoveryAction, RecoveryConfig};
use crate::domain::ports::AgentRegistry;
use crate::services::message_bus::MessageBus;

/// End result of running a recovery plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The caller should retry; the backoff has already elapsed.
    Retry { delay: Duration },
    TakenOver { peer: AgentId },
    Escalated(EscalationOutcome),
}

/// Plans recovery for a failure and carries out any escalation.
pub struct RecoveryCoordinator {
    manager: Arc<ErrorRecoveryManager>,
    takeover: PeerTakeoverCoordinator,
    escalation: SupervisorEscalationHandler,
}

impl RecoveryCoordinator {
    pub fn new(
        config: RecoveryConfig,
        bus: Arc<MessageBus>,
        registry: Arc<dyn AgentRegistry>,
    ) -> Self {
        let response_timeout = Duration::from_millis(config.peer_response_timeout_ms);
        Self {
            manager: Arc::new(ErrorRecoveryManager::new(config)),
            takeover: PeerTakeoverCoordinator::new(bus.clone(), registry.clone(), response_timeout),
            escalation: SupervisorEscalationHandler::new(bus, registry),
        }
    }

    /// Shared manager, e.g. for an `ExecutionMonitor`.
    pub fn manager(&self) -> Arc<ErrorRecoveryManager> {
        self.manager.clone()
    }

    pub const fn takeover(&self) -> &PeerTakeoverCoordinator {
        &self.takeover
    }

    pub const fn escalation(&self) -> &SupervisorEscalationHandler {
        &self.escalation
    }

    /// Run the recovery plan for a failure.
    ///
    /// A takeover that no peer accepts falls back to supervisor escalation.
    pub async fn recover(&self, ctx: &ErrorContext) -> DomainResult<RecoveryOutcome> {
        let outcome = match self.manager.handle_error(ctx).await {
            RecoveryAction::Retry { delay } => RecoveryOutcome::Retry { delay },
            RecoveryAction::PeerTakeover => {
                match self.takeover.initiate_takeover(&ctx.agent_id, &ctx.task_id).await? {
                    TakeoverOutcome::Accepted { peer } => RecoveryOutcome::TakenOver { peer },
                    other => {
                        tracing::info!(agent_id = %ctx.agent_id, takeover = ?other, "Takeover failed, escalating");
                        RecoveryOutcome::Escalated(
                            self.escalation
                                .escalate_to_supervisor(&ctx.agent_id, &ctx.task_id, &ctx.error)
                                .await?,
                        )
                    }
                }
            }
            RecoveryAction::EscalateToSupervisor => RecoveryOutcome::Escalated(
                self.escalation
                    .escalate_to_supervisor(&ctx.agent_id, &ctx.task_id, &ctx.error)
                    .await?,
            ),
            RecoveryAction::EscalateToTop => RecoveryOutcome::Escalated(
                self.escalation
                    .escalate_to_top_layer(&ctx.agent_id, &ctx.task_id, &ctx.error)
                    .await?,
            ),
        };
        Ok(outcome)
    }
}
