//! MessageBus: the kernel's single communication surface.
//!
//! Validates, stamps, compresses, counts, persists and routes every
//! message. Owns the canonical per-agent queue map; the router only sees it
//! for the duration of a send.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, oneshot, Mutex, RwLock};
use uuid::Uuid;

use super::heartbeat::HeartbeatClock;
use super::message_compressor::{CompressionError, MessageCompressor};
use super::message_queue::PriorityQueue;
use super::message_router::{MessageRouter, OverflowEvent, RouteOutcome};
use super::message_stats::{MessageStats, MessageStatsCollector};
use super::message_validator::{MessageValidator, ValidationErrors};
use crate::domain::errors::DomainError;
use crate::domain::models::{AgentId, BusConfig, Message, MessageType, Recipient};
use crate::domain::ports::GovernanceRepository;

#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("Agent {0} is not registered on the bus")]
    UnknownAgent(AgentId),
}

impl From<BusError> for DomainError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Validation(e) => e.into(),
            BusError::Compression(e) => e.into(),
            BusError::UnknownAgent(id) => DomainError::AgentNotFound(id),
        }
    }
}

/// A registered wait for a reply of one type from a specific agent.
struct ReplyWaiter {
    from: AgentId,
    reply_type: MessageType,
    tx: oneshot::Sender<Message>,
}

pub struct MessageBus {
    config: BusConfig,
    queues: RwLock<HashMap<AgentId, PriorityQueue>>,
    router: MessageRouter,
    compressor: MessageCompressor,
    stats: RwLock<MessageStatsCollector>,
    overflow_tx: broadcast::Sender<OverflowEvent>,
    system_tx: broadcast::Sender<Message>,
    replies: Mutex<HashMap<Uuid, ReplyWaiter>>,
    repository: Option<Arc<dyn GovernanceRepository>>,
    clock: Option<Arc<HeartbeatClock>>,
}

impl MessageBus {
    pub fn new(config: BusConfig) -> Self {
        let capacity = config.overflow_channel_capacity.max(1);
        let (overflow_tx, _) = broadcast::channel(capacity);
        let (system_tx, _) = broadcast::channel(capacity);
        Self {
            router: MessageRouter::new(config.max_queue_size),
            compressor: MessageCompressor::new(config.compression_threshold_bytes),
            config,
            queues: RwLock::new(HashMap::new()),
            stats: RwLock::new(MessageStatsCollector::new()),
            overflow_tx,
            system_tx,
            replies: Mutex::new(HashMap::new()),
            repository: None,
            clock: None,
        }
    }

    /// Persist accepted messages through this repository.
    pub fn with_repository(mut self, repository: Arc<dyn GovernanceRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Stamp unstamped messages with this clock's heartbeat.
    pub fn with_clock(mut self, clock: Arc<HeartbeatClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub const fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Create an empty inbox for an agent. Existing inboxes are kept.
    pub async fn register_agent(&self, agent: impl Into<AgentId>) {
        let agent = agent.into();
        let mut queues = self.queues.write().await;
        if !queues.contains_key(&agent) {
            tracing::debug!(agent_id = %agent, "Agent registered on bus");
            queues.insert(agent, PriorityQueue::with_capacity(self.config.max_queue_size));
        }
    }

    /// Remove an agent's inbox, discarding anything still queued.
    pub async fn unregister_agent(&self, agent: &AgentId) -> bool {
        self.queues.write().await.remove(agent).is_some()
    }

    pub async fn is_registered(&self, agent: &AgentId) -> bool {
        self.queues.read().await.contains_key(agent)
    }

    pub async fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<_> = self.queues.read().await.keys().cloned().collect();
        agents.sort();
        agents
    }

    /// Validate and deliver a message.
    ///
    /// Fire-and-forget: overflow and unknown recipients are reported in the
    /// outcome and on the overflow channel, never as an error.
    pub async fn send(&self, mut message: Message) -> Result<RouteOutcome, BusError> {
        MessageValidator::validate_or_err(&message)?;

        if message.heartbeat_number.is_none() {
            if let Some(clock) = &self.clock {
                message.heartbeat_number = Some(clock.current());
            }
        }

        self.stats.write().await.record(&message);
        self.persist(&message).await;

        if message.to == Recipient::System {
            self.dispatch_system(message).await;
            return Ok(RouteOutcome::default());
        }

        let message = self.compressor.compress(message);
        let outcome = {
            let mut queues = self.queues.write().await;
            self.router.route(message, &mut queues)
        };

        if outcome.dropped > 0 {
            self.stats.write().await.record_dropped(outcome.dropped);
        }
        for event in &outcome.overflows {
            // No subscribers is fine
            let _ = self.overflow_tx.send(event.clone());
        }
        Ok(outcome)
    }

    /// Take the next message from an agent's inbox.
    pub async fn receive(&self, agent: &AgentId) -> Result<Option<Message>, BusError> {
        let next = {
            let mut queues = self.queues.write().await;
            let queue = queues
                .get_mut(agent)
                .ok_or_else(|| BusError::UnknownAgent(agent.clone()))?;
            queue.dequeue()
        };
        match next {
            Some(message) => Ok(Some(self.compressor.decompress(message)?)),
            None => Ok(None),
        }
    }

    /// Take everything from an agent's inbox, head first.
    pub async fn receive_all(&self, agent: &AgentId) -> Result<Vec<Message>, BusError> {
        let drained = {
            let mut queues = self.queues.write().await;
            queues
                .get_mut(agent)
                .ok_or_else(|| BusError::UnknownAgent(agent.clone()))?
                .drain()
        };
        drained
            .into_iter()
            .map(|m| self.compressor.decompress(m).map_err(BusError::from))
            .collect()
    }

    pub async fn queue_size(&self, agent: &AgentId) -> usize {
        self.queues.read().await.get(agent).map_or(0, PriorityQueue::len)
    }

    pub async fn stats(&self) -> MessageStats {
        self.stats.read().await.snapshot()
    }

    pub async fn reset_stats(&self) {
        self.stats.write().await.reset();
    }

    /// Overflow events for observability consumers.
    pub fn subscribe_overflow(&self) -> broadcast::Receiver<OverflowEvent> {
        self.overflow_tx.subscribe()
    }

    /// Every message addressed to `system`.
    pub fn subscribe_system(&self) -> broadcast::Receiver<Message> {
        self.system_tx.subscribe()
    }

    /// Wait for a system-addressed `reply_type` message from `from` whose
    /// `replyTo` is `request_id`. Other messages leave the wait in place.
    /// The receiver errors if the wait is cancelled.
    pub async fn expect_reply(
        &self,
        request_id: Uuid,
        from: AgentId,
        reply_type: MessageType,
    ) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().await.insert(
            request_id,
            ReplyWaiter {
                from,
                reply_type,
                tx,
            },
        );
        rx
    }

    pub async fn cancel_reply(&self, request_id: Uuid) {
        self.replies.lock().await.remove(&request_id);
    }

    async fn dispatch_system(&self, message: Message) {
        let request_id = message
            .reply_to
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok());

        if let Some(request_id) = request_id {
            let mut replies = self.replies.lock().await;
            let matches = replies
                .get(&request_id)
                .is_some_and(|w| w.from == message.from && w.reply_type == message.message_type);
            if matches {
                if let Some(waiter) = replies.remove(&request_id) {
                    tracing::debug!(
                        request_id = %request_id,
                        from = %message.from,
                        "Reply correlated"
                    );
                    let _ = waiter.tx.send(message.clone());
                }
            }
        }

        let _ = self.system_tx.send(message);
    }

    async fn persist(&self, message: &Message) {
        if !self.config.persist_messages {
            return;
        }
        if let Some(repository) = &self.repository {
            if let Err(e) = repository.insert_message(message).await {
                tracing::error!(message_id = %message.id, error = %e, "Failed to persist message");
            }
        }
    }
}
