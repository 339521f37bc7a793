//! Per-layer elections.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::{AccountabilityModule, GovernanceContext, PerformanceEvaluator};
use crate::domain::errors::DomainResult;
use crate::domain::models::{
    message::SYSTEM, ElectionResult, Layer, Message, MessageType, Recipient,
};
use crate::domain::ports::AgentRegistry;
use crate::services::heartbeat::HeartbeatListener;

/// Evaluates every agent of a layer and records one result per agent.
pub struct ElectionModule {
    ctx: GovernanceContext,
    registry: Arc<dyn AgentRegistry>,
    evaluator: PerformanceEvaluator,
    accountability: AccountabilityModule,
}

impl ElectionModule {
    pub fn new(
        ctx: GovernanceContext,
        registry: Arc<dyn AgentRegistry>,
        evaluator: PerformanceEvaluator,
        accountability: AccountabilityModule,
    ) -> Self {
        Self {
            ctx,
            registry,
            evaluator,
            accountability,
        }
    }

    pub const fn accountability(&self) -> &AccountabilityModule {
        &self.accountability
    }

    pub const fn evaluator(&self) -> &PerformanceEvaluator {
        &self.evaluator
    }

    /// Run one election round for a layer. An empty layer is a no-op.
    ///
    /// Every other agent in the layer is recorded as voting for the
    /// policy's recommendation.
    pub async fn trigger_election(
        &self,
        task_id: &str,
        layer: Layer,
        round: u64,
    ) -> DomainResult<Vec<ElectionResult>> {
        let agents = self.registry.agents_by_layer(layer).await?;
        if agents.is_empty() {
            tracing::debug!(layer = %layer, round, "Election skipped, layer is empty");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(agents.len());
        for agent in &agents {
            let score = self.evaluator.calculate_score(&agent.metrics);
            let action = self.accountability.assess(agent, &score);
            let votes: BTreeMap<_, _> = agents
                .iter()
                .filter(|voter| voter.id != agent.id)
                .map(|voter| (voter.id.clone(), action.as_str().to_string()))
                .collect();

            let result = ElectionResult {
                id: Uuid::new_v4(),
                task_id: task_id.to_string(),
                round,
                layer,
                action,
                target_agent_id: agent.id.clone(),
                votes,
                score: score.overall_score,
                result: action.outcome().to_string(),
                timestamp: Utc::now(),
            };
            self.ctx.repository.insert_election(&result).await?;
            self.accountability
                .record_action(task_id, &agent.id, action, score.overall_score)
                .await?;

            let notice = Message::new(
                task_id,
                SYSTEM,
                Recipient::Agent(agent.id.clone()),
                MessageType::ElectionResult,
                json!({
                    "electionId": result.id,
                    "round": round,
                    "layer": layer,
                    "action": action,
                    "result": result.result,
                    "score": score,
                }),
            );
            self.ctx.notify(notice).await;

            tracing::info!(
                layer = %layer,
                round,
                agent_id = %agent.id,
                score = score.overall_score,
                action = %action,
                "Election result"
            );
            results.push(result);
        }
        Ok(results)
    }
}

/// Runs elections for every layer each `interval` heartbeats.
pub struct ElectionScheduler {
    elections: Arc<ElectionModule>,
    task_id: String,
    interval: u64,
}

impl ElectionScheduler {
    pub fn new(elections: Arc<ElectionModule>, task_id: impl Into<String>, interval: u64) -> Self {
        Self {
            elections,
            task_id: task_id.into(),
            interval,
        }
    }

    /// Election round for a heartbeat, if one is due.
    pub const fn round_for(&self, heartbeat: u64) -> Option<u64> {
        if self.interval == 0 || heartbeat == 0 || heartbeat % self.interval != 0 {
            None
        } else {
            Some(heartbeat / self.interval)
        }
    }
}

#[async_trait]
impl HeartbeatListener for ElectionScheduler {
    async fn on_heartbeat(&self, heartbeat: u64) -> anyhow::Result<()> {
        let Some(round) = self.round_for(heartbeat) else {
            return Ok(());
        };
        tracing::info!(heartbeat, round, "Periodic election");
        for layer in Layer::ALL {
            self.elections
                .trigger_election(&self.task_id, layer, round)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryAgentRegistry, InMemoryGovernanceRepository};
    use crate::domain::models::{
        AccountabilityPolicy, AgentId, AgentMetrics, AgentRecord, ElectionAction,
    };
    use crate::domain::ports::GovernanceRepository;
    use crate::services::governance::test_support;

    async fn module(
        agents: Vec<AgentRecord>,
    ) -> (Arc<ElectionModule>, GovernanceContext, Arc<InMemoryGovernanceRepository>) {
        let ids: Vec<String> = agents.iter().map(|a| a.id.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (ctx, repo) = test_support::context(&id_refs).await;
        let registry = Arc::new(InMemoryAgentRegistry::new());
        for agent in agents {
            registry.register(agent).await;
        }
        let elections = ElectionModule::new(
            ctx.clone(),
            registry,
            PerformanceEvaluator::default(),
            AccountabilityModule::new(ctx.clone(), AccountabilityPolicy::default()),
        );
        (Arc::new(elections), ctx, repo)
    }

    fn failing_metrics() -> AgentMetrics {
        AgentMetrics {
            tasks_completed: 0,
            tasks_failed: 10,
            heartbeats_responded: 0,
            heartbeats_missed: 10,
            average_task_duration: 600_000.0,
            ..AgentMetrics::default()
        }
    }

    #[tokio::test]
    async fn test_election_records_one_result_per_agent() {
        let (elections, ctx, repo) = module(vec![
            AgentRecord::new("mid-1", Layer::Mid),
            AgentRecord::new("mid-2", Layer::Mid).with_metrics(failing_metrics()),
            AgentRecord::new("top-1", Layer::Top),
        ])
        .await;

        let results = elections.trigger_election("task-1", Layer::Mid, 1).await.unwrap();
        assert_eq!(results.len(), 2);

        let good = results.iter().find(|r| r.target_agent_id == AgentId::from("mid-1")).unwrap();
        assert_eq!(good.action, ElectionAction::Promote);
        assert_eq!(good.result, "promoted");
        assert_eq!(good.votes.len(), 1);
        assert_eq!(good.votes[&AgentId::from("mid-2")], "promote");

        let bad = results.iter().find(|r| r.target_agent_id == AgentId::from("mid-2")).unwrap();
        assert_eq!(bad.action, ElectionAction::Dismiss);

        assert_eq!(repo.list_elections("task-1").await.unwrap().len(), 2);
        let inbox = ctx.bus.receive_all(&AgentId::from("mid-2")).await.unwrap();
        assert_eq!(inbox[0].message_type, MessageType::ElectionResult);
        assert_eq!(inbox[0].content["action"], "dismiss");
    }

    #[tokio::test]
    async fn test_empty_layer_is_noop() {
        let (elections, _, repo) = module(vec![AgentRecord::new("top-1", Layer::Top)]).await;
        let results = elections.trigger_election("task-1", Layer::Bottom, 3).await.unwrap();
        assert!(results.is_empty());
        assert!(repo.list_elections("task-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scheduler_rounds() {
        let (elections, _, repo) = module(vec![AgentRecord::new("mid-1", Layer::Mid)]).await;
        let scheduler = ElectionScheduler::new(elections, "task-1", 15);

        assert_eq!(scheduler.round_for(14), None);
        assert_eq!(scheduler.round_for(15), Some(1));
        assert_eq!(scheduler.round_for(30), Some(2));

        scheduler.on_heartbeat(7).await.unwrap();
        assert!(repo.list_elections("task-1").await.unwrap().is_empty());

        scheduler.on_heartbeat(30).await.unwrap();
        let recorded = repo.list_elections("task-1").await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].round, 2);
    }
}
