//! Agent registry port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentId, AgentRecord, Layer};

/// Resolves agent identities without owning their lifecycle.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Get an agent by ID.
    async fn get_agent(&self, id: &AgentId) -> DomainResult<Option<AgentRecord>>;

    /// All agents in a layer, in registration order.
    async fn agents_by_layer(&self, layer: Layer) -> DomainResult<Vec<AgentRecord>>;
}
