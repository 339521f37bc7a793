//! `cadence simulate`: drive a scripted team through the kernel.
//!
//! Every heartbeat each agent drains its inbox and bottom-layer agents report
//! progress to their supervisors. A mid-layer agent proposes a task
//! allocation every third heartbeat and top-layer agents sign it one per
//! heartbeat. Elections run on the configured interval.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use clap::Args;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::adapters::memory::{InMemoryAgentRegistry, InMemoryGovernanceRepository, InMemoryWhiteboard};
use crate::adapters::sqlite::{initialize_from_config, SqliteGovernanceRepository};
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{
    AgentRecord, AgentSpec, Config, DecisionProposal, DecisionStatus, DecisionType,
    ElectionResult, Layer, Message, MessageType, Recipient,
};
use crate::domain::ports::{AgentRegistry, GovernanceRepository};
use crate::infrastructure::logging::LoggerImpl;
use crate::services::{
    AccountabilityModule, ElectionModule, ElectionScheduler, GovernanceContext, GovernanceEngine,
    HeartbeatClock, HeartbeatListener, MessageBus, MessageStats, PerformanceEvaluator,
};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of heartbeats to run
    #[arg(long, default_value_t = 20)]
    pub heartbeats: u64,

    /// Override the configured heartbeat interval
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Task identifier used for every message and decision
    #[arg(long, default_value = "simulation")]
    pub task_id: String,

    /// Record decisions, audits, elections and messages in SQLite
    #[arg(long)]
    pub persist: bool,
}

/// Roster used when the configuration names no agents.
pub fn default_roster() -> Vec<AgentSpec> {
    let spec = |id: &str, layer, supervisor: Option<&str>| AgentSpec {
        id: id.to_string(),
        layer,
        supervisor: supervisor.map(str::to_string),
    };
    vec![
        spec("top-1", Layer::Top, None),
        spec("top-2", Layer::Top, None),
        spec("mid-1", Layer::Mid, Some("top-1")),
        spec("bottom-1", Layer::Bottom, Some("mid-1")),
        spec("bottom-2", Layer::Bottom, Some("mid-1")),
        spec("bottom-3", Layer::Bottom, Some("mid-1")),
    ]
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub id: Uuid,
    pub decision_type: DecisionType,
    pub status: DecisionStatus,
    pub signers: usize,
    pub required: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub heartbeats: u64,
    pub agents: usize,
    pub decisions: Vec<DecisionSummary>,
    pub elections: Vec<ElectionResult>,
    pub stats: MessageStats,
}

impl CommandOutput for SimulationReport {
    fn to_human(&self) -> String {
        let mut by_type = list_table(&["type", "count"]);
        let mut types: Vec<_> = self.stats.by_type.iter().collect();
        types.sort_by_key(|(t, _)| t.as_str());
        for (message_type, count) in &types {
            by_type.add_row(vec![message_type.to_string(), count.to_string()]);
        }

        let mut per_agent = list_table(&["agent", "sent", "received"]);
        let mut agents: Vec<_> = self.stats.sent.keys().chain(self.stats.received.keys()).collect();
        agents.sort();
        agents.dedup();
        for agent in &agents {
            per_agent.add_row(vec![
                agent.to_string(),
                self.stats.sent_by(agent).to_string(),
                self.stats.received_by(agent).to_string(),
            ]);
        }

        let mut decisions = list_table(&["id", "type", "status", "signers"]);
        for d in &self.decisions {
            decisions.add_row(vec![
                d.id.to_string()[..8].to_string(),
                d.decision_type.to_string(),
                d.status.to_string(),
                format!("{}/{}", d.signers, d.required),
            ]);
        }

        [
            format!(
                "Ran {} heartbeats with {} agents: {} messages, {} dropped, {} election results",
                self.heartbeats,
                self.agents,
                self.stats.total_messages,
                self.stats.dropped,
                self.elections.len()
            ),
            render_list("message type", &by_type, types.len()),
            render_list("agent", &per_agent, agents.len()),
            render_list("decision", &decisions, self.decisions.len()),
        ]
        .join("\n\n")
    }
}

/// Per-heartbeat behavior of the simulated team.
struct ScriptedTeam {
    task_id: String,
    engine: Arc<GovernanceEngine>,
    bus: Arc<MessageBus>,
    registry: Arc<InMemoryAgentRegistry>,
    pending: Mutex<Option<Uuid>>,
    finished: Mutex<Vec<Uuid>>,
    target: u64,
    done: Arc<Notify>,
}

impl ScriptedTeam {
    async fn work(&self, heartbeat: u64) -> Result<()> {
        for (index, agent) in self.registry.all().await.into_iter().enumerate() {
            let inbox = self.bus.receive_all(&agent.id).await?;
            let mut metrics = agent.metrics.clone();
            metrics.messages_processed += inbox.len() as u64;
            metrics.heartbeats_responded += 1;

            if agent.layer == Layer::Bottom {
                let offset = index as u64;
                #[allow(clippy::cast_precision_loss)]
                let duration_ms = 30_000.0 + 5_000.0 * offset as f64;
                metrics.record_task((heartbeat + offset) % 4 != 0, duration_ms);

                let to = agent
                    .supervisor
                    .clone()
                    .map_or(Recipient::Broadcast, Recipient::Agent);
                let report = Message::new(
                    &self.task_id,
                    agent.id.clone(),
                    to,
                    MessageType::ProgressReport,
                    json!({"progress": (heartbeat * 100 / self.target).min(100)}),
                );
                self.bus.send(report).await?;
            }
            self.registry.set_metrics(&agent.id, metrics).await?;
        }
        Ok(())
    }

    async fn govern(&self, heartbeat: u64) -> Result<()> {
        let tops: Vec<AgentRecord> = self.registry.agents_by_layer(Layer::Top).await?;
        if tops.is_empty() {
            return Ok(());
        }

        let mut pending = self.pending.lock().await;
        match *pending {
            None if heartbeat % 3 == 1 => {
                let mids = self.registry.agents_by_layer(Layer::Mid).await?;
                let proposer = mids.first().unwrap_or(&tops[0]).id.clone();
                let proposal = DecisionProposal::new(
                    &self.task_id,
                    proposer,
                    DecisionType::TaskAllocation,
                    json!({"heartbeat": heartbeat, "assign": "next milestone"}),
                    tops.iter().map(|a| a.id.clone()).collect(),
                );
                let decision = self.engine.propose(proposal).await?;
                *pending = Some(decision.id);
            }
            None => {}
            Some(id) => {
                let decision = self.engine.decision(id).await?;
                let next = decision.outstanding_signers().into_iter().next();
                let decision = match next {
                    Some(signer) if !decision.status.is_terminal() => {
                        self.engine.sign(id, &signer).await?
                    }
                    _ => decision,
                };
                if decision.status.is_terminal() {
                    self.finished.lock().await.push(id);
                    *pending = None;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl HeartbeatListener for ScriptedTeam {
    async fn on_heartbeat(&self, heartbeat: u64) -> Result<()> {
        if heartbeat > self.target {
            return Ok(());
        }
        let outcome = async {
            self.work(heartbeat).await?;
            self.govern(heartbeat).await
        }
        .await;
        if heartbeat == self.target {
            self.done.notify_one();
        }
        outcome
    }
}

/// Build the kernel, run it for `args.heartbeats` ticks and collect a report.
pub async fn run(args: &SimulateArgs, config: &Config) -> Result<SimulationReport> {
    ensure!(args.heartbeats > 0, "--heartbeats must be at least 1");
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(config.heartbeat.interval_ms));

    let roster = if config.agents.is_empty() {
        default_roster()
    } else {
        config.agents.clone()
    };
    let registry = Arc::new(InMemoryAgentRegistry::from_roster(&roster).await);

    let repository: Arc<dyn GovernanceRepository> = if args.persist {
        let pool = initialize_from_config(&config.database)
            .await
            .context("Failed to open the simulation database")?;
        Arc::new(SqliteGovernanceRepository::new(pool))
    } else {
        Arc::new(InMemoryGovernanceRepository::new())
    };

    let clock = Arc::new(HeartbeatClock::new(interval));
    let bus = Arc::new(
        MessageBus::new(config.bus.clone())
            .with_repository(repository.clone())
            .with_clock(clock.clone()),
    );
    for spec in &roster {
        bus.register_agent(spec.id.as_str()).await;
    }

    let ctx = GovernanceContext::new(repository.clone(), bus.clone())
        .with_whiteboard(Arc::new(InMemoryWhiteboard::new()));
    let engine = Arc::new(GovernanceEngine::new(ctx.clone(), config.governance.clone()));
    let elections = Arc::new(ElectionModule::new(
        ctx.clone(),
        registry.clone(),
        PerformanceEvaluator::new(config.election.clone()),
        AccountabilityModule::new(ctx, config.accountability.clone()),
    ));

    let done = Arc::new(Notify::new());
    let team = Arc::new(ScriptedTeam {
        task_id: args.task_id.clone(),
        engine: engine.clone(),
        bus: bus.clone(),
        registry,
        pending: Mutex::new(None),
        finished: Mutex::new(Vec::new()),
        target: args.heartbeats,
        done: done.clone(),
    });

    clock
        .add_listener(Arc::new(ElectionScheduler::new(
            elections,
            &args.task_id,
            config.governance.election_interval_heartbeats,
        )))
        .await;
    clock.add_listener(team.clone()).await;

    tracing::info!(heartbeats = args.heartbeats, agents = roster.len(), "Simulation starting");
    clock.start()?;
    done.notified().await;
    clock.stop();
    engine.shutdown();

    let mut ids = team.finished.lock().await.clone();
    ids.extend(*team.pending.lock().await);
    let mut decisions = Vec::with_capacity(ids.len());
    for id in ids {
        let decision = engine.decision(id).await?;
        decisions.push(DecisionSummary {
            id,
            decision_type: decision.decision_type,
            status: decision.status,
            signers: decision.signers.len(),
            required: decision.require_signers.len(),
        });
    }

    Ok(SimulationReport {
        heartbeats: args.heartbeats,
        agents: roster.len(),
        decisions,
        elections: repository.list_elections(&args.task_id).await?,
        stats: bus.stats().await,
    })
}

pub async fn execute(args: &SimulateArgs, config: &Config, json: bool) -> Result<()> {
    let mut logging = config.logging.clone();
    if json {
        logging.enable_stdout = false;
    }
    let _logger = LoggerImpl::init(&logging)?;

    let report = run(args, config).await?;
    output(&report, json);
    Ok(())
}
