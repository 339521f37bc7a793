//! Periodic signature reminders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::GovernanceContext;
use crate::domain::models::{Message, MessagePriority, MessageType, Recipient};

type Timers = Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>;

/// Re-sends signature requests to outstanding signers until the decision
/// leaves `pending`.
pub struct SignatureReminderSystem {
    ctx: GovernanceContext,
    interval: Duration,
    timers: Timers,
}

impl SignatureReminderSystem {
    pub fn new(ctx: GovernanceContext, interval: Duration) -> Self {
        Self {
            ctx,
            interval,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start reminding for a decision. Restarting replaces the old timer.
    pub fn start_reminder(&self, decision_id: Uuid) {
        if self.interval.is_zero() {
            return;
        }
        let ctx = self.ctx.clone();
        let timers = self.timers.clone();
        let interval = self.interval;

        let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !remind(&ctx, decision_id).await {
                    break;
                }
            }
            timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&decision_id);
        });
        if let Some(previous) = guard.insert(decision_id, handle) {
            previous.abort();
        }
    }

    /// Stop reminding for a decision. Returns whether a timer was active.
    pub fn stop_reminder(&self, decision_id: Uuid) -> bool {
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

    pub fn active_count(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Cancel every reminder. Returns how many were active.
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

impl Drop for SignatureReminderSystem {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Send one round of reminders. Returns false once there is nothing left
/// to remind about.
async fn remind(ctx: &GovernanceContext, decision_id: Uuid) -> bool {
    let decision = match ctx.repository.get_decision(decision_id).await {
        Ok(Some(d)) => d,
        Ok(None) => return false,
        Err(e) => {
            tracing::warn!(decision_id = %decision_id, error = %e, "Reminder could not load decision");
            return true;
        }
    };
    if decision.status.is_terminal() {
        tracing::debug!(decision_id = %decision_id, status = %decision.status, "Reminder stopped");
        return false;
    }

    let outstanding = decision.outstanding_signers();
    for signer in &outstanding {
        let reminder = Message::new(
            &decision.task_id,
            decision.proposer_id.clone(),
            Recipient::Agent(signer.clone()),
            MessageType::SignatureRequest,
            json!({
                "decisionId": decision.id,
                "type": decision.decision_type,
                "content": decision.content,
                "proposerId": decision.proposer_id,
                "reminder": true,
                "pendingSigners": outstanding.len(),
            }),
        )
        .with_priority(MessagePriority::High);
        ctx.notify(reminder).await;
    }
    tracing::debug!(decision_id = %decision_id, outstanding = outstanding.len(), "Signature reminders sent");
    true
}
