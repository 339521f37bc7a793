//! One-shot signature timeouts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::GovernanceContext;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    message::SYSTEM, AgentId, AuditEventType, AuditRecord, DecisionStatus, Message,
    MessagePriority, MessageType, Recipient,
};

/// Reason recorded on decisions rejected by timeout.
pub const TIMEOUT_REASON: &str = "Signature timeout";

type Timers = Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>;

/// Rejects decisions still pending when their timer expires.
pub struct SignatureTimeoutHandler {
    ctx: GovernanceContext,
    default_timeout: Duration,
    timers: Timers,
}

impl SignatureTimeoutHandler {
    pub fn new(ctx: GovernanceContext, default_timeout: Duration) -> Self {
        Self {
            ctx,
            default_timeout,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Arm the timer for a decision, replacing any earlier one.
    pub fn start_timeout(&self, decision_id: Uuid, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let ctx = self.ctx.clone();
        let timers = self.timers.clone();

        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&decision_id);
            if let Err(e) = expire(&ctx, decision_id).await {
                tracing::error!(decision_id = %decision_id, error = %e, "Signature timeout handling failed");
            }
        });
        if let Some(previous) = guard.insert(decision_id, handle) {
            previous.abort();
        }
        tracing::debug!(decision_id = %decision_id, timeout_secs = timeout.as_secs(), "Signature timeout armed");
    }

    pub fn cancel_timeout(&self, decision_id: Uuid) -> bool {
        let handle = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&decision_id);
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Expire a decision immediately, as if its timer had fired.
    pub async fn handle_timeout(&self, decision_id: Uuid) -> DomainResult<bool> {
        self.cancel_timeout(decision_id);
        expire(&self.ctx, decision_id).await
    }

    pub fn active_count(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cancel every timer. Returns how many were armed.
    pub fn cleanup(&self) -> usize {
        let drained: Vec<_> = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, handle) in &drained {
            handle.abort();
        }
        drained.len()
    }
}

impl Drop for SignatureTimeoutHandler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Reject the decision if it is still pending. Returns whether it was.
async fn expire(ctx: &GovernanceContext, decision_id: Uuid) -> DomainResult<bool> {
    let _guard = ctx.lock_transitions().await;
    let Some(decision) = ctx.repository.get_decision(decision_id).await? else {
        return Ok(false);
    };
    if decision.status != DecisionStatus::Pending {
        return Ok(false);
    }

    ctx.repository
        .update_status(decision_id, DecisionStatus::Rejected)
        .await?;
    ctx.record_audit(
        AuditRecord::new(&decision.task_id, AuditEventType::Timeout, AgentId::from(SYSTEM))
            .for_decision(decision_id)
            .with_reason(TIMEOUT_REASON),
    )
    .await;

    let notice = Message::new(
        &decision.task_id,
        SYSTEM,
        Recipient::Agent(decision.proposer_id.clone()),
        MessageType::SignatureVeto,
        json!({
            "decisionId": decision_id,
            "vetoerId": SYSTEM,
            "reason": TIMEOUT_REASON,
        }),
    )
    .with_priority(MessagePriority::High);
    ctx.notify(notice).await;

    tracing::warn!(
        decision_id = %decision_id,
        signed = decision.signers.len(),
        required = decision.require_signers.len(),
        "Decision rejected by signature timeout"
    );
    Ok(true)
}
