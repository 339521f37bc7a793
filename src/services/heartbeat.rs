//! Heartbeat clock.
//!
//! The kernel's only time source. Ticks at a fixed interval and hands each
//! heartbeat number to every registered listener in registration order.
//! A failing or panicking listener is logged and skipped; delivery to the
//! remaining listeners and future ticks is unaffected.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::models::HeartbeatConfig;

/// Receives every heartbeat while the clock runs.
#[async_trait]
pub trait HeartbeatListener: Send + Sync {
    async fn on_heartbeat(&self, heartbeat: u64) -> anyhow::Result<()>;
}

/// Adapts a plain closure into a listener.
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F> HeartbeatListener for FnListener<F>
where
    F: Fn(u64) -> anyhow::Result<()> + Send + Sync,
{
    async fn on_heartbeat(&self, heartbeat: u64) -> anyhow::Result<()> {
        (self.0)(heartbeat)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeartbeatError {
    #[error("Heartbeat clock is already running")]
    AlreadyRunning,
    #[error("Heartbeat interval must be greater than zero")]
    ZeroInterval,
}

type Listeners = Arc<RwLock<Vec<Arc<dyn HeartbeatListener>>>>;

/// Fixed-interval tick generator.
pub struct HeartbeatClock {
    interval: Duration,
    counter: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    listeners: Listeners,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            counter: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            listeners: Arc::new(RwLock::new(Vec::new())),
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(config: &HeartbeatConfig) -> Self {
        Self::new(Duration::from_millis(config.interval_ms))
    }

    /// Register a listener. Listeners added while running see the next tick.
    pub async fn add_listener(&self, listener: Arc<dyn HeartbeatListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Register a closure as a listener.
    pub async fn on_tick<F>(&self, f: F)
    where
        F: Fn(u64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_listener(Arc::new(FnListener(f))).await;
    }

    /// Start ticking. Resets the heartbeat counter to zero.
    pub fn start(&self) -> Result<(), HeartbeatError> {
        if self.interval.is_zero() {
            return Err(HeartbeatError::ZeroInterval);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HeartbeatError::AlreadyRunning);
        }
        self.counter.store(0, Ordering::SeqCst);

        let counter = self.counter.clone();
        let running = self.running.clone();
        let listeners = self.listeners.clone();
        let period = self.interval;
        let first = Instant::now() + period;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                let heartbeat = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::trace!(heartbeat, "Heartbeat");

                let snapshot: Vec<_> = listeners.read().await.clone();
                for (index, listener) in snapshot.iter().enumerate() {
                    match AssertUnwindSafe(listener.on_heartbeat(heartbeat))
                        .catch_unwind()
                        .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::warn!(heartbeat, listener = index, error = %e, "Heartbeat listener failed");
                        }
                        Err(_) => {
                            tracing::error!(heartbeat, listener = index, "Heartbeat listener panicked");
                        }
                    }
                }
            }
        });

        *self.handle.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Heartbeat clock started");
        Ok(())
    }

    /// Stop ticking. A pending tick is not delivered.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!(heartbeat = self.current(), "Heartbeat clock stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The most recent heartbeat number (0 before the first tick).
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Logical elapsed time: heartbeats times interval.
    pub fn elapsed_time(&self) -> Duration {
        let ticks = u32::try_from(self.current()).unwrap_or(u32::MAX);
        self.interval.saturating_mul(ticks)
    }
}

impl Drop for HeartbeatClock {
    fn drop(&mut self) {
        self.stop();
    }
}
