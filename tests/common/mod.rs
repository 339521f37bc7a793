//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use cadence::adapters::memory::{InMemoryAgentRegistry, InMemoryGovernanceRepository};
use cadence::domain::models::{
    AgentRecord, BusConfig, Layer, Message, MessageType, Recipient,
};
use cadence::services::{GovernanceContext, MessageBus};
use serde_json::json;

pub const TASK: &str = "task-1";

/// Two top agents, one mid, two bottoms under the mid.
pub fn team() -> Vec<AgentRecord> {
    vec![
        AgentRecord::new("top-1", Layer::Top),
        AgentRecord::new("top-2", Layer::Top),
        AgentRecord::new("mid-1", Layer::Mid).with_supervisor("top-1"),
        AgentRecord::new("bottom-1", Layer::Bottom).with_supervisor("mid-1"),
        AgentRecord::new("bottom-2", Layer::Bottom).with_supervisor("mid-1"),
    ]
}

pub async fn bus_for(agents: &[AgentRecord], config: BusConfig) -> Arc<MessageBus> {
    let bus = Arc::new(MessageBus::new(config));
    for agent in agents {
        bus.register_agent(agent.id.clone()).await;
    }
    bus
}

pub async fn registry_for(agents: Vec<AgentRecord>) -> Arc<InMemoryAgentRegistry> {
    let registry = Arc::new(InMemoryAgentRegistry::new());
    for agent in agents {
        registry.register(agent).await;
    }
    registry
}

/// Governance context over an in-memory repository and a bus holding `team()`.
pub async fn governance() -> (GovernanceContext, Arc<InMemoryGovernanceRepository>, Arc<MessageBus>) {
    let repo = Arc::new(InMemoryGovernanceRepository::new());
    let bus = bus_for(&team(), BusConfig::default()).await;
    let ctx = GovernanceContext::new(repo.clone(), bus.clone());
    (ctx, repo, bus)
}

pub fn progress(from: &str, to: Recipient) -> Message {
    Message::new(TASK, from, to, MessageType::ProgressReport, json!({"progress": 50}))
}
