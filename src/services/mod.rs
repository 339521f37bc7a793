pub mod governance;
pub mod heartbeat;
pub mod message_bus;
pub mod message_compressor;
pub mod message_queue;
pub mod message_router;
pub mod message_stats;
pub mod message_validator;
pub mod recovery;

pub use governance::{
    AccountabilityModule, ElectionModule, ElectionScheduler, GovernanceContext, GovernanceEngine,
    PerformanceEvaluator, SignatureModule, SignatureReminderSystem, SignatureTimeoutHandler,
    VetoModule,
};
pub use heartbeat::{FnListener, HeartbeatClock, HeartbeatError, HeartbeatListener};
pub use message_bus::{BusError, MessageBus};
pub use message_compressor::{CompressionError, MessageCompressor};
pub use message_queue::PriorityQueue;
pub use message_router::{MessageRouter, OverflowEvent, RouteOutcome};
pub use message_stats::{MessageStats, MessageStatsCollector};
pub use message_validator::{MessageValidator, ValidationErrors, ValidationReport};
pub use recovery::{
    ErrorRecoveryManager, EscalationOutcome, ExecutionMonitor, PeerTakeoverCoordinator,
    RecoveryCoordinator, RecoveryOutcome, TakeoverOutcome, TimeoutOutcome,
    SupervisorEscalationHandler,
};
