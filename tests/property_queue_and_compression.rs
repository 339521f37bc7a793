//! Property tests for inbox ordering, content compression and error
//! classification.

use std::time::Duration;

use cadence::domain::models::{
    Message, MessagePriority, MessageType, Recipient, RecoveryConfig, Severity,
};
use cadence::services::{ErrorRecoveryManager, MessageCompressor, PriorityQueue};
use proptest::prelude::*;
use serde_json::json;

fn priority_strategy() -> impl Strategy<Value = MessagePriority> {
    prop_oneof![
        Just(MessagePriority::Low),
        Just(MessagePriority::Normal),
        Just(MessagePriority::High),
        Just(MessagePriority::Urgent),
    ]
}

fn indexed(index: usize, priority: MessagePriority) -> Message {
    Message::new(
        "task-1",
        "bottom-1",
        Recipient::agent("mid-1"),
        MessageType::ProgressReport,
        json!({ "index": index }),
    )
    .with_priority(priority)
}

proptest! {
    #[test]
    fn proptest_queue_drains_by_priority_then_fifo(
        priorities in prop::collection::vec(priority_strategy(), 0..64)
    ) {
        let mut queue = PriorityQueue::new();
        for (i, p) in priorities.iter().enumerate() {
            queue.enqueue(indexed(i, *p));
        }
        prop_assert_eq!(queue.len(), priorities.len());

        let drained: Vec<(MessagePriority, u64)> = queue
            .drain()
            .into_iter()
            .map(|m| (m.priority, m.content["index"].as_u64().unwrap()))
            .collect();
        prop_assert!(queue.is_empty());

        let mut expected: Vec<(MessagePriority, u64)> = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| (*p, i as u64))
            .collect();
        expected.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        prop_assert_eq!(drained, expected);
    }

    #[test]
    fn proptest_compression_restores_content(
        text in ".{0,400}",
        count in any::<i64>(),
        flag in any::<bool>(),
        threshold in 0usize..512,
    ) {
        let content = json!({ "text": text, "count": count, "flag": flag });
        let size = serde_json::to_vec(&content).unwrap().len();
        let compressor = MessageCompressor::new(threshold);
        let message = Message::new(
            "task-1",
            "bottom-1",
            Recipient::agent("mid-1"),
            MessageType::ProgressReport,
            content.clone(),
        );

        let packed = compressor.compress(message);
        prop_assert_eq!(packed.compressed, size >= threshold);
        if packed.compressed {
            prop_assert_eq!(packed.original_size, Some(size));
        }

        let restored = compressor.decompress(packed).unwrap();
        prop_assert!(!restored.compressed);
        prop_assert_eq!(restored.content, content);
    }
}

#[test_strategy::proptest]
fn proptest_credential_failures_are_critical(
    #[strategy("[a-z0-9 ]{0,24}")] prefix: String,
    #[strategy("[a-z0-9 ]{0,24}")] suffix: String,
) {
    let error = format!("{prefix} Permission denied {suffix}");
    prop_assert_eq!(ErrorRecoveryManager::classify_error(&error), Severity::Critical);
}

#[test_strategy::proptest]
fn proptest_backoff_doubles_per_attempt(#[strategy(0u32..20)] attempt: u32) {
    let manager = ErrorRecoveryManager::new(RecoveryConfig::default());
    for severity in [Severity::Low, Severity::Medium, Severity::High] {
        let here = manager.backoff_delay(severity, attempt);
        let next = manager.backoff_delay(severity, attempt + 1);
        prop_assert_eq!(next, here * 2);
        prop_assert!(here >= Duration::from_millis(1000));
    }
}
