//! Governance engine - proposals, signatures, vetoes, elections.
//!
//! The engine is a thin coordinator over its modules:
//!
//! - **signature**: proposal creation and quorum signing
//! - **veto**: single-vote rejection
//! - **reminder**: periodic re-requests to outstanding signers
//! - **timeout**: one-shot rejection of stale proposals
//! - **performance**: agent score calculation
//! - **accountability**: warning/demotion/dismissal/promotion policy
//! - **election**: per-layer evaluation rounds driven by the heartbeat

mod accountability;
mod election;
mod performance;
mod reminder;
mod signature;
mod timeout;
mod veto;

pub use accountability::AccountabilityModule;
pub use election::{ElectionModule, ElectionScheduler};
pub use performance::PerformanceEvaluator;
pub use reminder::SignatureReminderSystem;
pub use signature::SignatureModule;
pub use timeout::SignatureTimeoutHandler;
pub use veto::VetoModule;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentId, AuditRecord, Decision, DecisionProposal, GovernanceConfig, Message,
};
use crate::domain::ports::{AuditFilter, GovernanceRepository, Whiteboard};
use crate::services::message_bus::MessageBus;

/// Collaborators shared by every governance module.
#[derive(Clone)]
pub struct GovernanceContext {
    pub repository: Arc<dyn GovernanceRepository>,
    pub bus: Arc<MessageBus>,
    pub whiteboard: Option<Arc<dyn Whiteboard>>,
    transitions: Arc<Mutex<()>>,
}

impl GovernanceContext {
    pub fn new(repository: Arc<dyn GovernanceRepository>, bus: Arc<MessageBus>) -> Self {
        Self {
            repository,
            bus,
            whiteboard: None,
            transitions: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_whiteboard(mut self, whiteboard: Arc<dyn Whiteboard>) -> Self {
        self.whiteboard = Some(whiteboard);
        self
    }

    /// Serializes decision state transitions across sign, veto and timeout.
    pub(crate) async fn lock_transitions(&self) -> MutexGuard<'_, ()> {
        self.transitions.lock().await
    }

    pub(crate) async fn load_decision(&self, id: Uuid) -> DomainResult<Decision> {
        self.repository
            .get_decision(id)
            .await?
            .ok_or(DomainError::DecisionNotFound(id))
    }

    pub(crate) async fn audit(&self, record: AuditRecord) -> DomainResult<()> {
        tracing::debug!(
            event_type = %record.event_type,
            agent_id = %record.agent_id,
            task_id = %record.task_id,
            "Audit"
        );
        self.repository.insert_audit(&record).await
    }

    /// Audit an already persisted transition. A failed write is logged so
    /// that it can never leave the decision half-transitioned.
    pub(crate) async fn record_audit(&self, record: AuditRecord) {
        let event_type = record.event_type;
        let decision_id = record.decision_id;
        if let Err(e) = self.audit(record).await {
            tracing::error!(
                event_type = %event_type,
                decision_id = ?decision_id,
                error = %e,
                "Failed to write audit record"
            );
        }
    }

    /// Send a notification. Delivery problems are logged, never raised.
    pub(crate) async fn notify(&self, message: Message) {
        let message_id = message.id;
        let to = message.to.to_string();
        if let Err(e) = self.bus.send(message).await {
            tracing::warn!(message_id = %message_id, to = %to, error = %e, "Notification not sent");
        }
    }
}

/// Front door for decision lifecycles.
///
/// Proposing arms the reminder and the timeout for the decision; any
/// terminal transition disarms both.
pub struct GovernanceEngine {
    ctx: GovernanceContext,
    config: GovernanceConfig,
    signatures: SignatureModule,
    vetoes: VetoModule,
    reminders: SignatureReminderSystem,
    timeouts: SignatureTimeoutHandler,
}

impl GovernanceEngine {
    pub fn new(ctx: GovernanceContext, config: GovernanceConfig) -> Self {
        Self {
            signatures: SignatureModule::new(ctx.clone(), config.signature.clone()),
            vetoes: VetoModule::new(ctx.clone()),
            reminders: SignatureReminderSystem::new(
                ctx.clone(),
                Duration::from_secs(config.reminder_interval_secs),
            ),
            timeouts: SignatureTimeoutHandler::new(
                ctx.clone(),
                Duration::from_secs(config.signature_timeout_secs),
            ),
            ctx,
            config,
        }
    }

    pub const fn context(&self) -> &GovernanceContext {
        &self.ctx
    }

    pub const fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub const fn signatures(&self) -> &SignatureModule {
        &self.signatures
    }

    pub const fn vetoes(&self) -> &VetoModule {
        &self.vetoes
    }

    pub const fn reminders(&self) -> &SignatureReminderSystem {
        &self.reminders
    }

    pub const fn timeouts(&self) -> &SignatureTimeoutHandler {
        &self.timeouts
    }

    pub async fn propose(&self, proposal: DecisionProposal) -> DomainResult<Decision> {
        let timeout = proposal.timeout_secs.map(Duration::from_secs);
        let decision = self.signatures.propose_decision(proposal).await?;
        self.reminders.start_reminder(decision.id);
        self.timeouts.start_timeout(decision.id, timeout);
        Ok(decision)
    }

    pub async fn sign(&self, id: Uuid, signer: &AgentId) -> DomainResult<Decision> {
        let decision = self.signatures.sign_decision(id, signer).await?;
        if decision.status.is_terminal() {
            self.disarm(id);
        }
        Ok(decision)
    }

    pub async fn veto(&self, id: Uuid, vetoer: &AgentId, reason: &str) -> DomainResult<Decision> {
        let decision = self.vetoes.veto_decision(id, vetoer, reason).await?;
        self.disarm(id);
        Ok(decision)
    }

    pub async fn decision(&self, id: Uuid) -> DomainResult<Decision> {
        self.ctx.load_decision(id).await
    }

    pub async fn audits(&self, filter: AuditFilter) -> DomainResult<Vec<AuditRecord>> {
        self.ctx.repository.list_audits(filter).await
    }

    /// Cancel every outstanding reminder and timeout.
    pub fn shutdown(&self) {
        let reminders = self.reminders.cleanup();
        let timeouts = self.timeouts.cleanup();
        tracing::info!(reminders, timeouts, "Governance timers cancelled");
    }

    fn disarm(&self, id: Uuid) {
        self.reminders.stop_reminder(id);
        self.timeouts.cancel_timeout(id);
    }
}
