//! Whiteboard port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::AgentId;

/// Shared Markdown document store, one document per scope.
#[async_trait]
pub trait Whiteboard: Send + Sync {
    /// Append a Markdown fragment to the document for `scope`.
    async fn append(&self, scope: &str, markdown: &str, author: &AgentId) -> DomainResult<()>;
}
