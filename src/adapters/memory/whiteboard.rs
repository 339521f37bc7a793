use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::AgentId;
use crate::domain::ports::Whiteboard;

#[derive(Debug, Clone, Default)]
struct Document {
    content: String,
    version: u64,
}

/// Versioned Markdown documents keyed by scope.
///
/// Every write bumps the document version; `write` rejects stale versions.
#[derive(Default)]
pub struct InMemoryWhiteboard {
    documents: RwLock<HashMap<String, Document>>,
}

impl InMemoryWhiteboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content and version. Unknown scopes read as empty at version 0.
    pub async fn read(&self, scope: &str) -> (String, u64) {
        self.documents
            .read()
            .await
            .get(scope)
            .map(|d| (d.content.clone(), d.version))
            .unwrap_or_default()
    }

    /// Replace a document if nobody wrote it since `expected_version`.
    pub async fn write(&self, scope: &str, content: &str, expected_version: u64) -> DomainResult<u64> {
        let mut documents = self.documents.write().await;
        let doc = documents.entry(scope.to_string()).or_default();
        if doc.version != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                entity: "whiteboard".to_string(),
                id: scope.to_string(),
            });
        }
        doc.content = content.to_string();
        doc.version += 1;
        Ok(doc.version)
    }
}

#[async_trait]
impl Whiteboard for InMemoryWhiteboard {
    async fn append(&self, scope: &str, markdown: &str, author: &AgentId) -> DomainResult<()> {
        let mut documents = self.documents.write().await;
        let doc = documents.entry(scope.to_string()).or_default();
        if !doc.content.is_empty() && !doc.content.ends_with('\n') {
            doc.content.push('\n');
        }
        doc.content.push_str(markdown);
        doc.version += 1;
        tracing::debug!(scope, author = %author, version = doc.version, "Whiteboard updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_versioned_writes() {
        let board = InMemoryWhiteboard::new();
        assert_eq!(board.read("task-1").await, (String::new(), 0));

        assert_eq!(board.write("task-1", "# Plan", 0).await.unwrap(), 1);
        assert!(matches!(
            board.write("task-1", "# Stale", 0).await,
            Err(DomainError::ConcurrencyConflict { .. })
        ));

        board
            .append("task-1", "- approved", &AgentId::from("system"))
            .await
            .unwrap();
        assert_eq!(board.read("task-1").await, ("# Plan\n- approved".to_string(), 2));
    }
}
