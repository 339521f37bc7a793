use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::domain::models::{Message, MessagePriority};

/// Heap entry wrapping a message with its enqueue sequence number.
#[derive(Debug, Clone)]
struct QueueEntry {
    priority: MessagePriority,
    sequence: u64,
    message: Message,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then lower sequence (FIFO)
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Per-agent inbox ordered by (priority descending, enqueue order).
///
/// The queue itself is unbounded; capacity is enforced by the router,
/// which checks `len()` before every enqueue.
///
/// # Examples
///
/// ```
/// use cadence::domain::models::{Message, MessagePriority, MessageType, Recipient};
/// use cadence::services::PriorityQueue;
/// use serde_json::json;
///
/// let mut queue = PriorityQueue::new();
/// let low = Message::new("t", "a", Recipient::agent("b"), MessageType::ProgressReport, json!({}))
///     .with_priority(MessagePriority::Low);
/// let urgent = Message::new("t", "a", Recipient::agent("b"), MessageType::ErrorReport, json!({}))
///     .with_priority(MessagePriority::Urgent);
/// queue.enqueue(low);
/// queue.enqueue(urgent);
///
/// assert_eq!(queue.dequeue().unwrap().message_type, MessageType::ErrorReport);
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl PriorityQueue {
    #[allow(clippy::missing_const_for_fn)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    pub fn enqueue(&mut self, message: Message) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueueEntry {
            priority: message.priority,
            sequence,
            message,
        });
    }

    /// Remove and return the head, or `None` when empty.
    pub fn dequeue(&mut self) -> Option<Message> {
        self.heap.pop().map(|entry| entry.message)
    }

    pub fn peek(&self) -> Option<&Message> {
        self.heap.peek().map(|entry| &entry.message)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Remove every message, head first.
    pub fn drain(&mut self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(message) = self.dequeue() {
            out.push(message);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{MessageType, Recipient};
    use serde_json::json;

    fn msg(n: u64, priority: MessagePriority) -> Message {
        Message::new(
            "task",
            "sender",
            Recipient::agent("receiver"),
            MessageType::ProgressReport,
            json!({ "n": n }),
        )
        .with_priority(priority)
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = PriorityQueue::new();
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());
        assert!(queue.peek().is_none());
    }

    #[test]
    fn test_priority_then_fifo() {
        let mut queue = PriorityQueue::new();
        queue.enqueue(msg(1, MessagePriority::Normal));
        queue.enqueue(msg(2, MessagePriority::High));
        queue.enqueue(msg(3, MessagePriority::Normal));
        queue.enqueue(msg(4, MessagePriority::Urgent));
        queue.enqueue(msg(5, MessagePriority::High));

        let order: Vec<u64> = queue
            .drain()
            .iter()
            .map(|m| m.content["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![4, 2, 5, 1, 3]);
    }

    #[test]
    fn test_len_and_clear() {
        let mut queue = PriorityQueue::with_capacity(4);
        for i in 0..4 {
            queue.enqueue(msg(i, MessagePriority::Low));
        }
        assert_eq!(queue.len(), 4);
        queue.clear();
        assert!(queue.is_empty());
    }
}
