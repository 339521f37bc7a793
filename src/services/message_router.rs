//! Message routing over the bus's queue map.
//!
//! The router owns no queues. The bus lends it the map for the duration of
//! one delivery.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::message_queue::PriorityQueue;
use crate::domain::models::{AgentId, Message, MessageType, Recipient};

/// Emitted when a delivery is refused because the target queue is full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverflowEvent {
    pub agent_id: AgentId,
    pub message_id: Uuid,
    pub message_type: MessageType,
    pub from: AgentId,
    pub timestamp: DateTime<Utc>,
}

/// What happened to one routed message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    pub delivered: usize,
    pub dropped: usize,
    pub overflows: Vec<OverflowEvent>,
}

impl RouteOutcome {
    fn drop_overflow(&mut self, agent: &AgentId, message: &Message) {
        self.dropped += 1;
        self.overflows.push(OverflowEvent {
            agent_id: agent.clone(),
            message_id: message.id,
            message_type: message.message_type,
            from: message.from.clone(),
            timestamp: Utc::now(),
        });
    }
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    max_queue_size: usize,
}

impl MessageRouter {
    pub const fn new(max_queue_size: usize) -> Self {
        Self { max_queue_size }
    }

    pub const fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Deliver a message to zero, one or many queues.
    ///
    /// Broadcasts skip the sender and check every recipient's capacity
    /// independently. System messages are not queued here.
    pub fn route(
        &self,
        message: Message,
        queues: &mut HashMap<AgentId, PriorityQueue>,
    ) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();

        match &message.to {
            Recipient::Broadcast => {
                for (agent, queue) in queues.iter_mut() {
                    if *agent == message.from {
                        continue;
                    }
                    if queue.len() >= self.max_queue_size {
                        self.warn_overflow(agent, &message);
                        outcome.drop_overflow(agent, &message);
                    } else {
                        queue.enqueue(message.clone());
                        outcome.delivered += 1;
                    }
                }
                tracing::debug!(
                    message_id = %message.id,
                    delivered = outcome.delivered,
                    dropped = outcome.dropped,
                    "Broadcast routed"
                );
            }
            Recipient::System => {
                tracing::debug!(
                    message_id = %message.id,
                    from = %message.from,
                    message_type = %message.message_type,
                    "System message received"
                );
            }
            Recipient::Agent(agent) => {
                let agent = agent.clone();
                match queues.get_mut(&agent) {
                    Some(queue) if queue.len() >= self.max_queue_size => {
                        self.warn_overflow(&agent, &message);
                        outcome.drop_overflow(&agent, &message);
                    }
                    Some(queue) => {
                        queue.enqueue(message);
                        outcome.delivered = 1;
                    }
                    None => {
                        tracing::warn!(
                            message_id = %message.id,
                            to = %agent,
                            "Unknown recipient, message dropped"
                        );
                        outcome.dropped = 1;
                    }
                }
            }
        }

        outcome
    }

    fn warn_overflow(&self, agent: &AgentId, message: &Message) {
        tracing::warn!(
            agent_id = %agent,
            message_id = %message.id,
            message_type = %message.message_type,
            from = %message.from,
            max_queue_size = self.max_queue_size,
            "Queue overflow, message dropped"
        );
    }
}
