mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence::domain::models::{AgentId, BusConfig, Recipient};
use cadence::services::{HeartbeatClock, HeartbeatError, HeartbeatListener, MessageBus};

/// Reports progress to its supervisor on every heartbeat.
struct Reporter {
    bus: Arc<MessageBus>,
}

#[async_trait]
impl HeartbeatListener for Reporter {
    async fn on_heartbeat(&self, _heartbeat: u64) -> anyhow::Result<()> {
        self.bus
            .send(common::progress("bottom-1", Recipient::agent("mid-1")))
            .await?;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_tick_count_follows_elapsed_time() {
    let clock = HeartbeatClock::new(Duration::from_millis(1000));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    clock
        .on_tick(move |n| {
            sink.lock().unwrap().push(n);
            Ok(())
        })
        .await;

    clock.start().unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    clock.stop();

    assert_eq!(*seen.lock().unwrap(), (1..=10).collect::<Vec<_>>());
    assert_eq!(clock.current(), 10);
    assert_eq!(clock.elapsed_time(), Duration::from_secs(10));
    assert!(!clock.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_failing_listener_does_not_starve_others() {
    let clock = HeartbeatClock::new(Duration::from_millis(500));
    clock
        .on_tick(|n| {
            if n % 2 == 0 {
                anyhow::bail!("listener failed on heartbeat {n}");
            }
            Ok(())
        })
        .await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    clock
        .on_tick(move |n| {
            sink.lock().unwrap().push(n);
            Ok(())
        })
        .await;

    clock.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2_750)).await;
    clock.stop();

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_bus_stamps_messages_with_current_heartbeat() {
    let clock = Arc::new(HeartbeatClock::new(Duration::from_millis(200)));
    let bus = MessageBus::new(BusConfig::default()).with_clock(clock.clone());
    let bus = Arc::new(bus);
    bus.register_agent("mid-1").await;
    bus.register_agent("bottom-1").await;
    clock.add_listener(Arc::new(Reporter { bus: bus.clone() })).await;

    clock.start().unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    clock.stop();

    let inbox = bus.receive_all(&AgentId::from("mid-1")).await.unwrap();
    let stamps: Vec<_> = inbox.iter().map(|m| m.heartbeat_number).collect();
    assert_eq!(stamps, vec![Some(1), Some(2), Some(3)]);
}

#[tokio::test(start_paused = true)]
async fn test_start_guards() {
    let idle = HeartbeatClock::new(Duration::ZERO);
    assert_eq!(idle.start(), Err(HeartbeatError::ZeroInterval));

    let clock = HeartbeatClock::new(Duration::from_millis(100));
    clock.start().unwrap();
    assert_eq!(clock.start(), Err(HeartbeatError::AlreadyRunning));
    clock.stop();

    // Restarting resets the counter
    tokio::time::sleep(Duration::from_millis(250)).await;
    clock.start().unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(clock.current(), 1);
    clock.stop();
}
