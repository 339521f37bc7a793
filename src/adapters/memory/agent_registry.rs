use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AgentId, AgentMetrics, AgentRecord, AgentSpec, AgentStatus, Layer};
use crate::domain::ports::AgentRegistry;

/// Agent registry backed by process memory. Keeps registration order.
#[derive(Default)]
pub struct InMemoryAgentRegistry {
    agents: RwLock<Vec<AgentRecord>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a configured roster.
    pub async fn from_roster(roster: &[AgentSpec]) -> Self {
        let registry = Self::new();
        for spec in roster {
            let mut record = AgentRecord::new(spec.id.as_str(), spec.layer);
            if let Some(supervisor) = &spec.supervisor {
                record = record.with_supervisor(supervisor.as_str());
            }
            registry.register(record).await;
        }
        registry
    }

    /// Add an agent, replacing any record with the same id.
    pub async fn register(&self, agent: AgentRecord) {
        let mut agents = self.agents.write().await;
        match agents.iter_mut().find(|a| a.id == agent.id) {
            Some(existing) => *existing = agent,
            None => agents.push(agent),
        }
    }

    pub async fn remove(&self, id: &AgentId) -> bool {
        let mut agents = self.agents.write().await;
        let before = agents.len();
        agents.retain(|a| a.id != *id);
        agents.len() != before
    }

    pub async fn set_status(&self, id: &AgentId, status: AgentStatus) -> DomainResult<()> {
        self.update(id, |a| a.status = status).await
    }

    pub async fn set_layer(&self, id: &AgentId, layer: Layer) -> DomainResult<()> {
        self.update(id, |a| a.layer = layer).await
    }

    /// Replace an agent's metrics snapshot.
    pub async fn set_metrics(&self, id: &AgentId, metrics: AgentMetrics) -> DomainResult<()> {
        self.update(id, |a| a.metrics = metrics).await
    }

    pub async fn all(&self) -> Vec<AgentRecord> {
        self.agents.read().await.clone()
    }

    async fn update<F>(&self, id: &AgentId, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut AgentRecord) + Send,
    {
        let mut agents = self.agents.write().await;
        let agent = agents
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| DomainError::AgentNotFound(id.clone()))?;
        f(agent);
        Ok(())
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn get_agent(&self, id: &AgentId) -> DomainResult<Option<AgentRecord>> {
        Ok(self.agents.read().await.iter().find(|a| a.id == *id).cloned())
    }

    async fn agents_by_layer(&self, layer: Layer) -> DomainResult<Vec<AgentRecord>> {
        Ok(self
            .agents
            .read()
            .await
            .iter()
            .filter(|a| a.layer == layer)
            .cloned()
            .collect())
    }
}
