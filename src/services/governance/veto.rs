//! Single-vote decision rejection.

use serde_json::json;
use uuid::Uuid;

use super::GovernanceContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    message::SYSTEM, AgentId, AuditEventType, AuditRecord, Decision, DecisionStatus, Message,
    MessagePriority, MessageType, Recipient,
};

pub struct VetoModule {
    ctx: GovernanceContext,
}

impl VetoModule {
    pub fn new(ctx: GovernanceContext) -> Self {
        Self { ctx }
    }

    /// Reject a pending decision. One veto is final regardless of how many
    /// signatures the decision already has.
    pub async fn veto_decision(
        &self,
        id: Uuid,
        vetoer: &AgentId,
        reason: &str,
    ) -> DomainResult<Decision> {
        let _guard = self.ctx.lock_transitions().await;
        let mut decision = self.ctx.load_decision(id).await?;

        if !decision.is_required_signer(vetoer) {
            return Err(DomainError::NotAuthorized {
                agent: vetoer.clone(),
                decision: id,
            });
        }
        if decision.status != DecisionStatus::Pending {
            return Err(DomainError::InvalidDecisionStatus {
                decision: id,
                status: decision.status,
            });
        }

        self.ctx.repository.add_vetoer(id, vetoer).await?;
        self.ctx
            .repository
            .update_status(id, DecisionStatus::Rejected)
            .await?;
        decision.vetoers.push(vetoer.clone());
        decision.status = DecisionStatus::Rejected;

        self.ctx
            .record_audit(
                AuditRecord::new(&decision.task_id, AuditEventType::Veto, vetoer.clone())
                    .for_decision(id)
                    .with_reason(reason),
            )
            .await;

        let notice = Message::new(
            &decision.task_id,
            SYSTEM,
            Recipient::Agent(decision.proposer_id.clone()),
            MessageType::SignatureVeto,
            json!({
                "decisionId": id,
                "vetoerId": vetoer,
                "reason": reason,
            }),
        )
        .with_priority(MessagePriority::High);
        self.ctx.notify(notice).await;

        tracing::info!(decision_id = %id, vetoer = %vetoer, reason, "Decision vetoed");
        Ok(decision)
    }
}
