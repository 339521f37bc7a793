mod common;

use std::sync::Arc;

use cadence::domain::models::{
    AgentId, AgentRecord, BusConfig, Layer, Message, MessagePriority, MessageType, Recipient,
};
use cadence::services::{BusError, MessageBus};
use serde_json::json;

use common::TASK;

fn small_bus_config() -> BusConfig {
    BusConfig {
        max_queue_size: 3,
        ..BusConfig::default()
    }
}

#[tokio::test]
async fn test_overflow_drops_the_message_past_capacity() {
    let bus = common::bus_for(&common::team(), small_bus_config()).await;
    let mut overflows = bus.subscribe_overflow();
    let mid = AgentId::from("mid-1");

    for _ in 0..3 {
        let outcome = bus
            .send(common::progress("bottom-1", Recipient::Agent(mid.clone())))
            .await
            .unwrap();
        assert_eq!(outcome.delivered, 1);
    }

    let rejected = common::progress("bottom-2", Recipient::Agent(mid.clone()));
    let rejected_id = rejected.id;
    let outcome = bus.send(rejected).await.unwrap();
    assert_eq!(outcome.delivered, 0);
    assert_eq!(outcome.dropped, 1);

    let event = overflows.try_recv().unwrap();
    assert_eq!(event.agent_id, mid);
    assert_eq!(event.message_id, rejected_id);
    assert_eq!(event.from, AgentId::from("bottom-2"));

    assert_eq!(bus.queue_size(&mid).await, 3);
    let stats = bus.stats().await;
    assert_eq!(stats.total_messages, 4);
    assert_eq!(stats.dropped, 1);

    // Draining frees capacity again
    bus.receive(&mid).await.unwrap();
    let outcome = bus
        .send(common::progress("bottom-2", Recipient::Agent(mid.clone())))
        .await
        .unwrap();
    assert_eq!(outcome.delivered, 1);
}

#[tokio::test]
async fn test_broadcast_skips_sender_and_checks_each_queue() {
    let bus = common::bus_for(&common::team(), small_bus_config()).await;
    let top2 = AgentId::from("top-2");

    for _ in 0..3 {
        bus.send(common::progress("top-1", Recipient::Agent(top2.clone())))
            .await
            .unwrap();
    }

    let outcome = bus
        .send(Message::new(
            TASK,
            "top-1",
            Recipient::Broadcast,
            MessageType::TaskAssign,
            json!({"phase": "review"}),
        ))
        .await
        .unwrap();

    // Five agents, minus the sender, minus the full top-2 inbox
    assert_eq!(outcome.delivered, 3);
    assert_eq!(outcome.dropped, 1);
    assert_eq!(outcome.overflows.len(), 1);
    assert_eq!(outcome.overflows[0].agent_id, top2);

    assert_eq!(bus.queue_size(&AgentId::from("top-1")).await, 0);
    for agent in ["mid-1", "bottom-1", "bottom-2"] {
        assert_eq!(bus.queue_size(&AgentId::from(agent)).await, 1);
    }
}

#[tokio::test]
async fn test_inbox_orders_by_priority_then_arrival() {
    let bus = common::bus_for(&common::team(), BusConfig::default()).await;
    let mid = AgentId::from("mid-1");

    let first_normal = common::progress("bottom-1", Recipient::Agent(mid.clone()));
    let second_normal = common::progress("bottom-2", Recipient::Agent(mid.clone()));
    let urgent = Message::new(
        TASK,
        "bottom-2",
        Recipient::Agent(mid.clone()),
        MessageType::ErrorReport,
        json!({"error": "ECONNREFUSED"}),
    )
    .with_priority(MessagePriority::Urgent);
    let low = common::progress("bottom-1", Recipient::Agent(mid.clone()))
        .with_priority(MessagePriority::Low);

    let expected = vec![urgent.id, first_normal.id, second_normal.id, low.id];
    for message in [low, first_normal, urgent, second_normal] {
        bus.send(message).await.unwrap();
    }

    let received: Vec<_> = bus.receive_all(&mid).await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(received, expected);
    assert!(bus.receive(&mid).await.unwrap().is_none());
}

#[tokio::test]
async fn test_large_content_is_transparently_compressed() {
    let config = BusConfig {
        compression_threshold_bytes: 64,
        ..BusConfig::default()
    };
    let bus = common::bus_for(&common::team(), config).await;
    let mid = AgentId::from("mid-1");
    let content = json!({
        "summary": "lexer done; ".repeat(40),
        "files": 12,
        "green": true,
    });

    bus.send(Message::new(
        TASK,
        "bottom-1",
        Recipient::Agent(mid.clone()),
        MessageType::ProgressReport,
        content.clone(),
    ))
    .await
    .unwrap();

    let received = bus.receive(&mid).await.unwrap().unwrap();
    assert!(!received.compressed);
    assert_eq!(received.original_size, None);
    assert_eq!(received.content, content);
}

#[tokio::test]
async fn test_invalid_messages_are_rejected_before_routing() {
    let bus = common::bus_for(&common::team(), BusConfig::default()).await;
    let mut bad = common::progress("bottom-1", Recipient::agent("mid-1"));
    bad.content = json!("not an object");
    bad.task_id = String::new();

    let err = bus.send(bad).await.unwrap_err();
    let BusError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.errors.len(), 2);
    assert_eq!(bus.stats().await.total_messages, 0);
    assert_eq!(bus.queue_size(&AgentId::from("mid-1")).await, 0);
}

#[tokio::test]
async fn test_unknown_recipient_counts_as_dropped() {
    let bus = common::bus_for(&common::team(), BusConfig::default()).await;
    let outcome = bus
        .send(common::progress("bottom-1", Recipient::agent("ghost")))
        .await
        .unwrap();
    assert_eq!(outcome.delivered, 0);
    assert_eq!(outcome.dropped, 1);
    assert!(outcome.overflows.is_empty());

    assert!(matches!(
        bus.receive(&AgentId::from("ghost")).await,
        Err(BusError::UnknownAgent(_))
    ));
}

#[tokio::test]
async fn test_reply_correlation_matches_request_and_sender() {
    let agents = vec![
        AgentRecord::new("bottom-1", Layer::Bottom),
        AgentRecord::new("bottom-2", Layer::Bottom),
    ];
    let bus: Arc<MessageBus> = common::bus_for(&agents, BusConfig::default()).await;
    let mut system = bus.subscribe_system();

    let request = Message::new(
        TASK,
        "system",
        Recipient::agent("bottom-2"),
        MessageType::PeerHelpRequest,
        json!({"failedAgent": "bottom-1"}),
    );
    let reply_rx = bus
        .expect_reply(request.id, AgentId::from("bottom-2"), MessageType::PeerHelpResponse)
        .await;
    bus.send(request.clone()).await.unwrap();

    // A reply from the wrong agent is not correlated
    bus.send(
        Message::new(TASK, "bottom-1", Recipient::System, MessageType::PeerHelpResponse, json!({"accept": true}))
            .with_reply_to(request.id),
    )
    .await
    .unwrap();
    bus.send(
        Message::new(TASK, "bottom-2", Recipient::System, MessageType::PeerHelpResponse, json!({"accept": true}))
            .with_reply_to(request.id),
    )
    .await
    .unwrap();

    let reply = reply_rx.await.unwrap();
    assert_eq!(reply.from, AgentId::from("bottom-2"));
    assert!(reply.is_reply_to(request.id));

    // Every system message is still observable
    assert_eq!(system.try_recv().unwrap().from, AgentId::from("bottom-1"));
    assert_eq!(system.try_recv().unwrap().from, AgentId::from("bottom-2"));
}

#[tokio::test]
async fn test_cancelled_reply_wait_closes_receiver() {
    let bus = common::bus_for(&common::team(), BusConfig::default()).await;
    let request_id = uuid::Uuid::new_v4();
    let rx = bus
        .expect_reply(request_id, AgentId::from("top-1"), MessageType::HeartbeatAck)
        .await;
    bus.cancel_reply(request_id).await;
    assert!(rx.await.is_err());
}

#[tokio::test]
async fn test_forged_size_hint_fails_receive_without_panicking() {
    let bus = common::bus_for(&common::team(), BusConfig::default()).await;
    let mid = AgentId::from("mid-1");
    let forged = Message::from_wire(json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "taskId": TASK,
        "from": "bottom-1",
        "to": "mid-1",
        "type": "PROGRESS_REPORT",
        "content": { "data": "AwA=" },
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "_compressed": true,
        "_originalSize": u64::MAX,
    }))
    .unwrap();
    assert!(forged.compressed);

    let outcome = bus.send(forged).await.unwrap();
    assert_eq!(outcome.delivered, 1);
    assert!(matches!(bus.receive(&mid).await, Err(BusError::Compression(_))));

    // The bad message is consumed and the inbox keeps working
    bus.send(common::progress("bottom-2", Recipient::agent("mid-1")))
        .await
        .unwrap();
    let next = bus.receive(&mid).await.unwrap().unwrap();
    assert_eq!(next.from, AgentId::from("bottom-2"));
}
