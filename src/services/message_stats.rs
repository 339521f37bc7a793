use std::collections::HashMap;

use serde::Serialize;

use crate::domain::models::{AgentId, Message, MessageType};

/// Point-in-time copy of the bus counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStats {
    pub total_messages: u64,
    pub by_type: HashMap<MessageType, u64>,
    pub sent: HashMap<AgentId, u64>,
    pub received: HashMap<AgentId, u64>,
    /// Deliveries refused because of overflow or an unknown recipient.
    pub dropped: u64,
}

impl MessageStats {
    pub fn count_of(&self, message_type: MessageType) -> u64 {
        self.by_type.get(&message_type).copied().unwrap_or(0)
    }

    pub fn sent_by(&self, agent: &AgentId) -> u64 {
        self.sent.get(agent).copied().unwrap_or(0)
    }

    pub fn received_by(&self, agent: &AgentId) -> u64 {
        self.received.get(agent).copied().unwrap_or(0)
    }
}

/// In-memory message counters. Not persisted.
#[derive(Debug, Default)]
pub struct MessageStatsCollector {
    stats: MessageStats,
}

impl MessageStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted message.
    pub fn record(&mut self, message: &Message) {
        self.stats.total_messages += 1;
        *self.stats.by_type.entry(message.message_type).or_insert(0) += 1;
        *self.stats.sent.entry(message.from.clone()).or_insert(0) += 1;
        if let Some(recipient) = message.to.as_agent() {
            *self.stats.received.entry(recipient.clone()).or_insert(0) += 1;
        }
    }

    pub fn record_dropped(&mut self, count: usize) {
        self.stats.dropped += count as u64;
    }

    pub fn snapshot(&self) -> MessageStats {
        self.stats.clone()
    }

    pub fn reset(&mut self) {
        self.stats = MessageStats::default();
    }
}
