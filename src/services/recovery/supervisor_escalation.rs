//! Escalating failures up the supervision chain.

use std::sync::Arc;

use serde_json::json;

use super::error_recovery::ErrorRecoveryManager;
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    message::SYSTEM, AgentId, Layer, Message, MessagePriority, MessageType, Recipient, Severity,
};
use crate::domain::ports::AgentRegistry;
use crate::services::message_bus::MessageBus;

/// Where an escalation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    Supervisor(AgentId),
    TopLayer(Vec<AgentId>),
    /// No supervisor and no top-layer agents to receive it.
    Unhandled,
}

pub struct SupervisorEscalationHandler {
    bus: Arc<MessageBus>,
    registry: Arc<dyn AgentRegistry>,
}

impl SupervisorEscalationHandler {
    pub fn new(bus: Arc<MessageBus>, registry: Arc<dyn AgentRegistry>) -> Self {
        Self { bus, registry }
    }

    /// Canned advice for the supervisor, keyed on the error text.
    pub fn suggest_remediation(error: &str) -> &'static str {
        match ErrorRecoveryManager::classify_error(error) {
            Severity::Critical => "Check API credentials and permissions for the agent",
            Severity::High => {
                "Check network connectivity or increase timeout; consider reassigning the task"
            }
            Severity::Medium => "Review the input files and fix syntax or path errors",
            Severity::Low => "Consider replacing the agent",
        }
    }

    /// Send the failure to the agent's supervisor, or to the top layer when
    /// it has none. An agent missing from the registry has no supervisor.
    pub async fn escalate_to_supervisor(
        &self,
        agent_id: &AgentId,
        task_id: &str,
        error: &str,
    ) -> DomainResult<EscalationOutcome> {
        let Some(agent) = self.registry.get_agent(agent_id).await? else {
            tracing::warn!(agent_id = %agent_id, "Agent not in registry, escalating to top layer");
            return self.escalate_to_top_layer(agent_id, task_id, error).await;
        };

        let Some(supervisor) = agent.supervisor.clone() else {
            tracing::info!(agent_id = %agent_id, "No supervisor configured, escalating to top layer");
            return self.escalate_to_top_layer(agent_id, task_id, error).await;
        };

        let escalation = Message::new(
            task_id,
            SYSTEM,
            Recipient::Agent(supervisor.clone()),
            MessageType::IssueEscalation,
            json!({
                "agentId": agent_id,
                "error": error,
                "severity": ErrorRecoveryManager::classify_error(error),
                "metrics": agent.metrics,
                "suggestion": Self::suggest_remediation(error),
            }),
        )
        .with_priority(MessagePriority::High);
        self.bus.send(escalation).await?;

        tracing::warn!(agent_id = %agent_id, supervisor = %supervisor, error, "Escalated to supervisor");
        Ok(EscalationOutcome::Supervisor(supervisor))
    }

    /// Ask every top-layer agent to decide on the failure.
    pub async fn escalate_to_top_layer(
        &self,
        agent_id: &AgentId,
        task_id: &str,
        error: &str,
    ) -> DomainResult<EscalationOutcome> {
        let top = self.registry.agents_by_layer(Layer::Top).await?;
        if top.is_empty() {
            tracing::error!(agent_id = %agent_id, error, "No top-layer agents to escalate to");
            return Ok(EscalationOutcome::Unhandled);
        }

        let mut notified = Vec::with_capacity(top.len());
        for leader in top {
            let escalation = Message::new(
                task_id,
                SYSTEM,
                Recipient::Agent(leader.id.clone()),
                MessageType::IssueEscalation,
                json!({
                    "agentId": agent_id,
                    "error": error,
                    "severity": Severity::Critical,
                    "requiresDecision": true,
                }),
            )
            .with_priority(MessagePriority::Urgent);
            self.bus.send(escalation).await?;
            notified.push(leader.id);
        }

        tracing::error!(agent_id = %agent_id, leaders = notified.len(), error, "Escalated to top layer");
        Ok(EscalationOutcome::TopLayer(notified))
    }
}
