//! Decision proposal and quorum signing.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::GovernanceContext;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentId, AuditEventType, AuditRecord, Decision, DecisionProposal, DecisionStatus,
    DecisionType, Message, MessagePriority, MessageType, Recipient, SignatureConfig,
};

pub struct SignatureModule {
    ctx: GovernanceContext,
    config: SignatureConfig,
}

impl SignatureModule {
    pub fn new(ctx: GovernanceContext, config: SignatureConfig) -> Self {
        Self { ctx, config }
    }

    pub fn threshold_for(&self, decision_type: DecisionType) -> usize {
        self.config.threshold_for(decision_type)
    }

    /// Create a pending decision and request a signature from every
    /// required signer.
    pub async fn propose_decision(&self, proposal: DecisionProposal) -> DomainResult<Decision> {
        if proposal.require_signers.is_empty() {
            return Err(DomainError::ValidationFailed(
                "a decision needs at least one required signer".to_string(),
            ));
        }

        let decision = Decision::new(proposal);
        let threshold = self.threshold_for(decision.decision_type);
        if threshold > decision.require_signers.len() {
            tracing::warn!(
                decision_id = %decision.id,
                threshold,
                signers = decision.require_signers.len(),
                "Threshold exceeds required signers; decision can only be vetoed or time out"
            );
        }

        self.ctx.repository.insert_decision(&decision).await?;
        self.ctx
            .record_audit(
                AuditRecord::new(&decision.task_id, AuditEventType::Propose, decision.proposer_id.clone())
                    .for_decision(decision.id),
            )
            .await;

        for signer in &decision.require_signers {
            let request = Message::new(
                &decision.task_id,
                decision.proposer_id.clone(),
                Recipient::Agent(signer.clone()),
                MessageType::SignatureRequest,
                json!({
                    "decisionId": decision.id,
                    "type": decision.decision_type,
                    "content": decision.content,
                    "proposerId": decision.proposer_id,
                    "requireSigners": decision.require_signers,
                    "threshold": threshold,
                }),
            )
            .with_priority(MessagePriority::High);
            self.ctx.notify(request).await;
        }

        tracing::info!(
            decision_id = %decision.id,
            decision_type = %decision.decision_type,
            proposer = %decision.proposer_id,
            threshold,
            "Decision proposed"
        );
        Ok(decision)
    }

    /// Record a signature. Approves the decision once the distinct signer
    /// count reaches the threshold for its type.
    ///
    /// A repeat signature on a pending decision that already has its quorum
    /// finishes the approval an earlier call could not persist.
    pub async fn sign_decision(&self, id: Uuid, signer: &AgentId) -> DomainResult<Decision> {
        let _guard = self.ctx.lock_transitions().await;
        let mut decision = self.ctx.load_decision(id).await?;
        let threshold = self.threshold_for(decision.decision_type);

        if !decision.is_required_signer(signer) {
            return Err(DomainError::NotAuthorized {
                agent: signer.clone(),
                decision: id,
            });
        }
        if decision.has_signed(signer) {
            if decision.status == DecisionStatus::Pending && decision.signers.len() >= threshold {
                tracing::warn!(decision_id = %id, signer = %signer, "Quorum already reached, completing approval");
                self.approve(&mut decision).await?;
                return Ok(decision);
            }
            return Err(DomainError::AlreadySigned {
                agent: signer.clone(),
                decision: id,
            });
        }
        if decision.status != DecisionStatus::Pending {
            return Err(DomainError::InvalidDecisionStatus {
                decision: id,
                status: decision.status,
            });
        }

        self.ctx.repository.add_signer(id, signer).await?;
        decision.signers.push(signer.clone());
        self.ctx
            .record_audit(AuditRecord::new(&decision.task_id, AuditEventType::Sign, signer.clone()).for_decision(id))
            .await;

        tracing::info!(
            decision_id = %id,
            signer = %signer,
            signed = decision.signers.len(),
            threshold,
            "Decision signed"
        );

        if decision.signers.len() >= threshold {
            self.approve(&mut decision).await?;
        }
        Ok(decision)
    }

    pub async fn get_decision(&self, id: Uuid) -> DomainResult<Decision> {
        self.ctx.load_decision(id).await
    }

    async fn approve(&self, decision: &mut Decision) -> DomainResult<()> {
        let approved_at = Utc::now();
        self.ctx.repository.approve(decision.id, approved_at).await?;
        decision.status = DecisionStatus::Approved;
        decision.approved_at = Some(approved_at);

        self.ctx
            .record_audit(
                AuditRecord::new(&decision.task_id, AuditEventType::Approve, decision.proposer_id.clone())
                    .for_decision(decision.id),
            )
            .await;

        let notice = Message::new(
            &decision.task_id,
            crate::domain::models::message::SYSTEM,
            Recipient::Agent(decision.proposer_id.clone()),
            MessageType::SignatureApprove,
            json!({
                "decisionId": decision.id,
                "signers": decision.signers,
                "approvedAt": approved_at,
            }),
        )
        .with_priority(MessagePriority::High);
        self.ctx.notify(notice).await;

        if let Some(whiteboard) = &self.ctx.whiteboard {
            let record = format_approval(decision);
            if let Err(e) = whiteboard
                .append(&decision.task_id, &record, &decision.proposer_id)
                .await
            {
                tracing::warn!(decision_id = %decision.id, error = %e, "Failed to record decision on whiteboard");
            }
        }

        tracing::info!(decision_id = %decision.id, "Decision approved");
        Ok(())
    }
}

fn format_approval(decision: &Decision) -> String {
    let signers: Vec<&str> = decision.signers.iter().map(AgentId::as_str).collect();
    let content = serde_json::to_string_pretty(&decision.content).unwrap_or_default();
    let approved_at = decision
        .approved_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    format!(
        "## Decision approved: {}\n\n\
         - **Decision**: {}\n\
         - **Proposer**: {}\n\
         - **Signers**: {}\n\
         - **Approved at**: {}\n\n\
         ```json\n{}\n```\n",
        decision.decision_type,
        decision.id,
        decision.proposer_id,
        signers.join(", "),
        approved_at,
        content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryWhiteboard;
    use crate::domain::ports::{AuditFilter, GovernanceRepository};
    use crate::services::governance::test_support;
    use std::sync::Arc;

    fn proposal(signers: &[&str]) -> DecisionProposal {
        DecisionProposal::new(
            "task-1",
            "mid-1",
            DecisionType::TechnicalProposal,
            json!({ "title": "Adopt tokio" }),
            signers.iter().map(|s| AgentId::from(*s)).collect(),
        )
    }

    #[tokio::test]
    async fn test_propose_sends_one_request_per_signer() {
        let (ctx, _) = test_support::context(&["mid-1", "top-1", "top-2"]).await;
        let module = SignatureModule::new(ctx.clone(), SignatureConfig::default());

        let decision = module.propose_decision(proposal(&["top-1", "top-2"])).await.unwrap();
        assert_eq!(decision.status, DecisionStatus::Pending);

        for top in ["top-1", "top-2"] {
            let inbox = ctx.bus.receive_all(&AgentId::from(top)).await.unwrap();
            assert_eq!(inbox.len(), 1);
            assert_eq!(inbox[0].message_type, MessageType::SignatureRequest);
            assert_eq!(inbox[0].content["decisionId"], json!(decision.id));
        }
    }

    #[tokio::test]
    async fn test_quorum_approves_and_notifies_proposer() {
        let (ctx, _) = test_support::context(&["mid-1", "top-1", "top-2"]).await;
        let whiteboard = Arc::new(InMemoryWhiteboard::new());
        let ctx = ctx.with_whiteboard(whiteboard.clone());
        let module = SignatureModule::new(ctx.clone(), SignatureConfig::default());
        let decision = module.propose_decision(proposal(&["top-1", "top-2"])).await.unwrap();

        let after_first = module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap();
        assert_eq!(after_first.status, DecisionStatus::Pending);

        let after_second = module.sign_decision(decision.id, &AgentId::from("top-2")).await.unwrap();
        assert_eq!(after_second.status, DecisionStatus::Approved);
        assert!(after_second.approved_at.is_some());

        let inbox = ctx.bus.receive_all(&AgentId::from("mid-1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message_type, MessageType::SignatureApprove);

        let (doc, _) = whiteboard.read("task-1").await;
        assert!(doc.contains("Decision approved: TECHNICAL_PROPOSAL"));
        assert!(doc.contains("top-1, top-2"));
    }

    #[tokio::test]
    async fn test_sign_errors() {
        let (ctx, _) = test_support::context(&["mid-1", "top-1", "top-2"]).await;
        let module = SignatureModule::new(ctx, SignatureConfig::default());
        let decision = module.propose_decision(proposal(&["top-1", "top-2"])).await.unwrap();

        let err = module.sign_decision(Uuid::new_v4(), &AgentId::from("top-1")).await.unwrap_err();
        assert!(matches!(err, DomainError::DecisionNotFound(_)));

        let err = module.sign_decision(decision.id, &AgentId::from("bottom-9")).await.unwrap_err();
        assert!(matches!(err, DomainError::NotAuthorized { .. }));

        module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap();
        let err = module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadySigned { .. }));

        module.sign_decision(decision.id, &AgentId::from("top-2")).await.unwrap();
        let err = module.sign_decision(decision.id, &AgentId::from("top-2")).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadySigned { .. }));
    }

    #[tokio::test]
    async fn test_sign_after_rejection_is_wrong_status() {
        let (ctx, repo) = test_support::context(&["mid-1", "top-1", "top-2"]).await;
        let module = SignatureModule::new(ctx, SignatureConfig::default());
        let decision = module.propose_decision(proposal(&["top-1", "top-2"])).await.unwrap();
        repo.update_status(decision.id, DecisionStatus::Rejected)
            .await
            .unwrap();

        let err = module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidDecisionStatus { status: DecisionStatus::Rejected, .. }
        ));
    }

    #[tokio::test]
    async fn test_single_signer_threshold() {
        let (ctx, _) = test_support::context(&["mid-1", "top-1"]).await;
        let module = SignatureModule::new(ctx, SignatureConfig::default());
        let mut p = proposal(&["top-1"]);
        p.decision_type = DecisionType::TaskAllocation;
        let decision = module.propose_decision(p).await.unwrap();

        let signed = module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap();
        assert_eq!(signed.status, DecisionStatus::Approved);
    }

    #[tokio::test]
    async fn test_failed_sign_audit_still_approves() {
        let (ctx, repo) = test_support::flaky_context(&["mid-1", "top-1"]).await;
        repo.fail_audits(AuditEventType::Sign);
        let module = SignatureModule::new(ctx, SignatureConfig::default());
        let mut p = proposal(&["top-1"]);
        p.decision_type = DecisionType::TaskAllocation;
        let decision = module.propose_decision(p).await.unwrap();

        let signed = module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap();
        assert_eq!(signed.status, DecisionStatus::Approved);

        let stored = module.get_decision(decision.id).await.unwrap();
        assert_eq!(stored.status, DecisionStatus::Approved);
        assert_eq!(stored.signers, vec![AgentId::from("top-1")]);

        let audits = repo.list_audits(AuditFilter::default()).await.unwrap();
        let events: Vec<_> = audits.iter().map(|a| a.event_type).collect();
        assert_eq!(events, vec![AuditEventType::Propose, AuditEventType::Approve]);
    }

    #[tokio::test]
    async fn test_repeat_signature_completes_interrupted_approval() {
        let (ctx, repo) = test_support::flaky_context(&["mid-1", "top-1", "top-2"]).await;
        let module = SignatureModule::new(ctx.clone(), SignatureConfig::default());
        let decision = module.propose_decision(proposal(&["top-1", "top-2"])).await.unwrap();
        module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap();

        repo.fail_next_approvals(1);
        let err = module.sign_decision(decision.id, &AgentId::from("top-2")).await.unwrap_err();
        assert!(matches!(err, DomainError::DatabaseError(_)));
        let stored = module.get_decision(decision.id).await.unwrap();
        assert_eq!(stored.status, DecisionStatus::Pending);
        assert_eq!(stored.signers.len(), 2);

        let retried = module.sign_decision(decision.id, &AgentId::from("top-2")).await.unwrap();
        assert_eq!(retried.status, DecisionStatus::Approved);
        assert_eq!(
            module.get_decision(decision.id).await.unwrap().status,
            DecisionStatus::Approved
        );

        let inbox = ctx.bus.receive_all(&AgentId::from("mid-1")).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message_type, MessageType::SignatureApprove);

        // Once approved a repeat is an ordinary duplicate again
        let err = module.sign_decision(decision.id, &AgentId::from("top-1")).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadySigned { .. }));
    }

    #[tokio::test]
    async fn test_propose_without_signers_rejected() {
        let (ctx, _) = test_support::context(&["mid-1"]).await;
        let module = SignatureModule::new(ctx, SignatureConfig::default());
        assert!(matches!(
            module.propose_decision(proposal(&[])).await,
            Err(DomainError::ValidationFailed(_))
        ));
    }
}
