//! Reassigning a failed agent's task to an idle peer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    message::SYSTEM, AgentId, AgentRecord, Message, MessagePriority, MessageType, Recipient,
};
use crate::domain::ports::AgentRegistry;
use crate::services::message_bus::MessageBus;

/// How a takeover attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeoverOutcome {
    /// No idle agent in the failed agent's layer.
    NoPeer,
    Accepted { peer: AgentId },
    Declined { peer: AgentId },
    /// The peer did not answer within the response timeout.
    TimedOut { peer: AgentId },
    /// The request could not be queued for the peer.
    Undeliverable { peer: AgentId },
}

impl TakeoverOutcome {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

pub struct PeerTakeoverCoordinator {
    bus: Arc<MessageBus>,
    registry: Arc<dyn AgentRegistry>,
    response_timeout: Duration,
}

impl PeerTakeoverCoordinator {
    pub fn new(
        bus: Arc<MessageBus>,
        registry: Arc<dyn AgentRegistry>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            registry,
            response_timeout,
        }
    }

    /// First idle agent in the failed agent's layer, excluding itself.
    /// An agent missing from the registry has no layer and so no peer.
    pub async fn find_peer(&self, failed: &AgentId) -> DomainResult<Option<AgentRecord>> {
        let Some(agent) = self.registry.get_agent(failed).await? else {
            tracing::warn!(failed_agent = %failed, "Agent not in registry, no peer to ask");
            return Ok(None);
        };
        let peers = self.registry.agents_by_layer(agent.layer).await?;
        Ok(peers
            .into_iter()
            .find(|peer| peer.id != *failed && peer.is_idle()))
    }

    /// Ask an idle peer to take over `task_id` and wait for its answer.
    ///
    /// The peer answers with a `PEER_HELP_RESPONSE` to `system` whose
    /// `replyTo` is the request id and whose content carries
    /// `"accepted": true|false`.
    pub async fn initiate_takeover(
        &self,
        failed: &AgentId,
        task_id: &str,
    ) -> DomainResult<TakeoverOutcome> {
        let Some(peer) = self.find_peer(failed).await? else {
            tracing::warn!(failed_agent = %failed, task_id, "No idle peer available for takeover");
            return Ok(TakeoverOutcome::NoPeer);
        };

        let request = Message::new(
            task_id,
            SYSTEM,
            Recipient::Agent(peer.id.clone()),
            MessageType::PeerHelpRequest,
            json!({
                "failedAgentId": failed,
                "taskId": task_id,
                "responseTimeoutMs": self.response_timeout.as_millis() as u64,
            }),
        )
        .with_priority(MessagePriority::Urgent);
        let request_id = request.id;

        let reply = self
            .bus
            .expect_reply(request_id, peer.id.clone(), MessageType::PeerHelpResponse)
            .await;
        let delivered = match self.bus.send(request).await {
            Ok(outcome) => outcome.delivered > 0,
            Err(e) => {
                tracing::warn!(peer = %peer.id, error = %e, "Peer help request rejected");
                false
            }
        };
        if !delivered {
            self.bus.cancel_reply(request_id).await;
            return Ok(TakeoverOutcome::Undeliverable { peer: peer.id });
        }

        tracing::info!(failed_agent = %failed, peer = %peer.id, task_id, "Peer takeover requested");
        let outcome = match tokio::time::timeout(self.response_timeout, reply).await {
            Ok(Ok(response)) => {
                let accepted =
                    response.content.get("accepted").and_then(serde_json::Value::as_bool)
                        == Some(true);
                if accepted {
                    TakeoverOutcome::Accepted { peer: peer.id }
                } else {
                    TakeoverOutcome::Declined { peer: peer.id }
                }
            }
            Ok(Err(_)) | Err(_) => {
                self.bus.cancel_reply(request_id).await;
                TakeoverOutcome::TimedOut { peer: peer.id }
            }
        };
        tracing::info!(failed_agent = %failed, outcome = ?outcome, "Peer takeover finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAgentRegistry;
    use crate::domain::models::{AgentStatus, BusConfig, Layer};

    async fn setup(agents: Vec<AgentRecord>) -> (Arc<MessageBus>, PeerTakeoverCoordinator) {
        let bus = Arc::new(MessageBus::new(BusConfig::default()));
        let registry = Arc::new(InMemoryAgentRegistry::new());
        for agent in agents {
            bus.register_agent(agent.id.clone()).await;
            registry.register(agent).await;
        }
        let coordinator =
            PeerTakeoverCoordinator::new(bus.clone(), registry, Duration::from_secs(10));
        (bus, coordinator)
    }

    fn team() -> Vec<AgentRecord> {
        vec![
            AgentRecord::new("mid-1", Layer::Mid).with_status(AgentStatus::Failed),
            AgentRecord::new("mid-2", Layer::Mid).with_status(AgentStatus::Busy),
            AgentRecord::new("mid-3", Layer::Mid),
            AgentRecord::new("bottom-1", Layer::Bottom),
        ]
    }

    /// Answer the first help request in `peer`'s inbox.
    fn respond(bus: Arc<MessageBus>, peer: &'static str, accepted: bool) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let peer_id = AgentId::from(peer);
            loop {
                if let Some(request) = bus.receive(&peer_id).await.unwrap() {
                    let response = Message::new(
                        request.task_id.clone(),
                        peer,
                        Recipient::System,
                        MessageType::PeerHelpResponse,
                        json!({ "accepted": accepted }),
                    )
                    .with_reply_to(request.id);
                    bus.send(response).await.unwrap();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    }

    #[tokio::test]
    async fn test_finds_idle_peer_in_same_layer() {
        let (_, coordinator) = setup(team()).await;
        let peer = coordinator.find_peer(&AgentId::from("mid-1")).await.unwrap().unwrap();
        assert_eq!(peer.id, AgentId::from("mid-3"));
    }

    #[tokio::test]
    async fn test_no_peer() {
        let (_, coordinator) = setup(team()).await;
        let outcome = coordinator
            .initiate_takeover(&AgentId::from("bottom-1"), "task-1")
            .await
            .unwrap();
        assert_eq!(outcome, TakeoverOutcome::NoPeer);
    }

    #[tokio::test]
    async fn test_unknown_agent_has_no_peer() {
        let (_, coordinator) = setup(team()).await;
        let outcome = coordinator
            .initiate_takeover(&AgentId::from("ghost"), "task-1")
            .await
            .unwrap();
        assert_eq!(outcome, TakeoverOutcome::NoPeer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_accepts() {
        let (bus, coordinator) = setup(team()).await;
        let responder = respond(bus, "mid-3", true);

        let outcome = coordinator
            .initiate_takeover(&AgentId::from("mid-1"), "task-1")
            .await
            .unwrap();
        assert_eq!(outcome, TakeoverOutcome::Accepted { peer: AgentId::from("mid-3") });
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_declines() {
        let (bus, coordinator) = setup(team()).await;
        let responder = respond(bus, "mid-3", false);

        let outcome = coordinator
            .initiate_takeover(&AgentId::from("mid-1"), "task-1")
            .await
            .unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(outcome, TakeoverOutcome::Declined { peer: AgentId::from("mid-3") });
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_replies_do_not_end_the_wait() {
        let (bus, coordinator) = setup(team()).await;
        let responder = {
            let bus = bus.clone();
            tokio::spawn(async move {
                let peer = AgentId::from("mid-3");
                loop {
                    if let Some(request) = bus.receive(&peer).await.unwrap() {
                        // A progress note answering the request is not the answer
                        let note = Message::new(
                            request.task_id.clone(),
                            "mid-3",
                            Recipient::System,
                            MessageType::ProgressReport,
                            json!({ "accepted": false }),
                        )
                        .with_reply_to(request.id);
                        bus.send(note).await.unwrap();
                        let answer = Message::new(
                            request.task_id.clone(),
                            "mid-3",
                            Recipient::System,
                            MessageType::PeerHelpResponse,
                            json!({ "accepted": true }),
                        )
                        .with_reply_to(request.id);
                        bus.send(answer).await.unwrap();
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            })
        };

        let outcome = coordinator
            .initiate_takeover(&AgentId::from("mid-1"), "task-1")
            .await
            .unwrap();
        assert_eq!(outcome, TakeoverOutcome::Accepted { peer: AgentId::from("mid-3") });
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_peer_times_out() {
        let (bus, coordinator) = setup(team()).await;
        let start = tokio::time::Instant::now();

        let outcome = coordinator
            .initiate_takeover(&AgentId::from("mid-1"), "task-1")
            .await
            .unwrap();
        assert_eq!(outcome, TakeoverOutcome::TimedOut { peer: AgentId::from("mid-3") });
        assert!(start.elapsed() >= Duration::from_secs(10));

        // A late answer resolves nothing
        let late = Message::new("task-1", "mid-3", Recipient::System, MessageType::PeerHelpResponse, json!({"accepted": true}))
            .with_reply_to(uuid::Uuid::new_v4());
        bus.send(late).await.unwrap();
    }
}
