//! Accountability policy and audit trail.

use serde_json::json;

use super::GovernanceContext;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    message::SYSTEM, AccountabilityPolicy, AgentId, AgentRecord, AuditEventType, AuditRecord,
    ElectionAction, Layer, Message, MessagePriority, MessageType, PerformanceScore, Recipient,
};
use crate::domain::ports::AuditFilter;

pub struct AccountabilityModule {
    ctx: GovernanceContext,
    policy: AccountabilityPolicy,
}

impl AccountabilityModule {
    pub fn new(ctx: GovernanceContext, policy: AccountabilityPolicy) -> Self {
        Self { ctx, policy }
    }

    pub const fn policy(&self) -> &AccountabilityPolicy {
        &self.policy
    }

    /// Decide what happens to an agent given its score and warning count.
    ///
    /// Rules are checked from most to least severe. Bottom-layer agents
    /// cannot be demoted and are warned instead; top-layer agents cannot
    /// be promoted.
    pub fn assess(&self, agent: &AgentRecord, score: &PerformanceScore) -> ElectionAction {
        let warnings = agent.metrics.warnings_received;
        let p = &self.policy;

        if warnings >= p.dismissal_warning_threshold || score.overall_score < p.dismissal_score {
            return ElectionAction::Dismiss;
        }
        if warnings >= p.warning_threshold || score.overall_score < p.demotion_score {
            return if agent.layer == Layer::Bottom {
                ElectionAction::Warn
            } else {
                ElectionAction::Demote
            };
        }
        if score.overall_score < p.warning_score {
            return ElectionAction::Warn;
        }
        if score.overall_score >= p.promotion_score && agent.layer != Layer::Top {
            return ElectionAction::Promote;
        }
        ElectionAction::Retain
    }

    /// Audit the outcome of an assessment. Warnings are also delivered to
    /// the agent; retention records nothing.
    pub async fn record_action(
        &self,
        task_id: &str,
        agent: &AgentId,
        action: ElectionAction,
        score: f64,
    ) -> DomainResult<()> {
        let reason = format!("Election outcome {} with score {score:.1}", action.outcome());
        let event_type = match action {
            ElectionAction::Retain => return Ok(()),
            ElectionAction::Warn => return self.issue_warning(task_id, agent, &reason).await,
            ElectionAction::Demote => AuditEventType::Demotion,
            ElectionAction::Dismiss => AuditEventType::Dismissal,
            ElectionAction::Promote => AuditEventType::Promotion,
        };
        self.ctx
            .audit(AuditRecord::new(task_id, event_type, agent.clone()).with_reason(reason))
            .await?;
        tracing::info!(agent_id = %agent, action = %action, score, "Accountability action recorded");
        Ok(())
    }

    /// Audit a warning and tell the agent. The agent owns its own warning
    /// counter and is expected to bump it on receipt.
    pub async fn issue_warning(&self, task_id: &str, agent: &AgentId, reason: &str) -> DomainResult<()> {
        self.ctx
            .audit(AuditRecord::new(task_id, AuditEventType::Warning, agent.clone()).with_reason(reason))
            .await?;

        let notice = Message::new(
            task_id,
            SYSTEM,
            Recipient::Agent(agent.clone()),
            MessageType::AccountabilityWarning,
            json!({
                "reason": reason,
                "warningThreshold": self.policy.warning_threshold,
                "dismissalThreshold": self.policy.dismissal_warning_threshold,
            }),
        )
        .with_priority(MessagePriority::High);
        self.ctx.notify(notice).await;

        tracing::warn!(agent_id = %agent, reason, "Accountability warning issued");
        Ok(())
    }

    /// Every audit record naming this agent.
    pub async fn history(&self, agent: &AgentId) -> DomainResult<Vec<AuditRecord>> {
        self.ctx
            .repository
            .list_audits(AuditFilter {
                agent_id: Some(agent.clone()),
                ..AuditFilter::default()
            })
            .await
    }
}
