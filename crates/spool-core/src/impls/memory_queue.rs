//! In-memory broker: named queues with priorities, delayed delivery and
//! dead-lettering.

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::{ConsumerTag, DeliveryTag, Message, SpoolError};
use crate::ports::{Publisher, Queue};

/// Message waiting for a consumer.
///
/// Higher priority first; FIFO within a priority.
#[derive(Debug, Clone)]
struct ReadyEntry {
    priority: u8,
    seq: u64,
    redelivered: bool,
    message: Message,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Delayed message entry.
///
/// We use reverse ordering so BinaryHeap acts as a min-heap (earliest first).
#[derive(Debug, Clone)]
struct ScheduledEntry {
    ready_at: Instant,
    seq: u64,
    message: Message,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .ready_at
            .cmp(&self.ready_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Per-queue counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub ready: usize,
    pub scheduled: usize,
    pub unacked: usize,
    pub acked: u64,
    pub dead_lettered: usize,
}

#[derive(Default)]
struct QueueState {
    ready: BinaryHeap<ReadyEntry>,
    scheduled: BinaryHeap<ScheduledEntry>,
    /// Delivered messages with the sequence number they were queued under.
    unacked: HashMap<DeliveryTag, (u64, Message)>,
    dead_letters: Vec<Message>,
    acked: u64,
}

impl QueueState {
    /// Move delayed messages whose time has come to the ready heap.
    fn promote_scheduled(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.ready_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else {
                break;
            };
            self.ready.push(ReadyEntry {
                priority: entry.message.priority(),
                seq: entry.seq,
                redelivered: false,
                message: entry.message,
            });
        }
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            ready: self.ready.len(),
            scheduled: self.scheduled.len(),
            unacked: self.unacked.len(),
            acked: self.acked,
            dead_lettered: self.dead_letters.len(),
        }
    }
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    next_tag: u64,
    next_seq: u64,
}

impl BrokerState {
    fn allocate_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn allocate_tag(&mut self) -> DeliveryTag {
        self.next_tag += 1;
        DeliveryTag::new(self.next_tag)
    }

    fn queue_mut(&mut self, name: &str) -> Result<&mut QueueState, SpoolError> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| SpoolError::queue(name, "queue is not declared"))
    }

    /// Route a message to `destination`. Returns false when it is unroutable.
    fn route(&mut self, destination: &str, message: Message) -> bool {
        if !self.queues.contains_key(destination) {
            return false;
        }
        let seq = self.allocate_seq();
        let Some(queue) = self.queues.get_mut(destination) else {
            return false;
        };
        match message.delay().filter(|delay| !delay.is_zero()) {
            Some(delay) => queue.scheduled.push(ScheduledEntry {
                ready_at: Instant::now() + delay,
                seq,
                message,
            }),
            None => queue.ready.push(ReadyEntry {
                priority: message.priority(),
                seq,
                redelivered: false,
                message,
            }),
        }
        true
    }
}

/// Development broker shared by queue and publisher handles.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` (idempotent).
    pub async fn declare(&self, name: &str) {
        let mut state = self.state.lock().await;
        state.queues.entry(name.to_string()).or_default();
    }

    /// Declare `name` and return a consuming handle onto it.
    pub async fn queue(&self, name: &str) -> InMemoryQueue {
        self.declare(name).await;
        InMemoryQueue {
            name: name.to_string(),
            broker: self.clone(),
            cancelled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Publisher whose default destination is `destination`.
    pub fn publisher(&self, destination: &str) -> InMemoryPublisher {
        InMemoryPublisher {
            destination: destination.to_string(),
            broker: self.clone(),
        }
    }

    /// Publish directly; returns false when `destination` is not declared.
    pub async fn publish_to(&self, destination: &str, message: Message) -> bool {
        self.state.lock().await.route(destination, message)
    }

    pub async fn counts(&self, name: &str) -> Option<QueueCounts> {
        let mut state = self.state.lock().await;
        let queue = state.queues.get_mut(name)?;
        queue.promote_scheduled(Instant::now());
        Some(queue.counts())
    }

    pub async fn dead_letters(&self, name: &str) -> Vec<Message> {
        let state = self.state.lock().await;
        state
            .queues
            .get(name)
            .map(|queue| queue.dead_letters.clone())
            .unwrap_or_default()
    }
}

/// Consuming handle onto one in-memory queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    name: String,
    broker: InMemoryBroker,
    cancelled: Arc<Mutex<Vec<ConsumerTag>>>,
}

impl InMemoryQueue {
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    /// Convenience for seeding: publish `payload` to this queue.
    pub async fn push(&self, payload: impl Into<Vec<u8>>) -> bool {
        self.broker.publish_to(&self.name, Message::new(payload)).await
    }

    pub async fn counts(&self) -> QueueCounts {
        self.broker.counts(&self.name).await.unwrap_or_default()
    }

    /// Consumer tags cancelled on this handle, in order.
    pub async fn cancelled_tags(&self) -> Vec<ConsumerTag> {
        self.cancelled.lock().await.clone()
    }

    fn delivery_tag(message: &Message) -> Result<DeliveryTag, SpoolError> {
        message.delivery_tag().ok_or(SpoolError::NotDelivered)
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Option<Message>, SpoolError> {
        if !self.cancelled.lock().await.is_empty() {
            return Err(SpoolError::queue(&self.name, "subscription was cancelled"));
        }

        let mut state = self.broker.state.lock().await;
        let tag = state.allocate_tag();
        let queue = state.queue_mut(&self.name)?;
        queue.promote_scheduled(Instant::now());

        let Some(entry) = queue.ready.pop() else {
            return Ok(None);
        };
        let message = entry.message.delivered(tag, entry.redelivered);
        queue.unacked.insert(tag, (entry.seq, message.clone()));
        Ok(Some(message))
    }

    async fn ack(&self, message: &Message) -> Result<(), SpoolError> {
        let tag = Self::delivery_tag(message)?;
        let mut state = self.broker.state.lock().await;
        let queue = state.queue_mut(&self.name)?;
        queue
            .unacked
            .remove(&tag)
            .ok_or(SpoolError::UnknownDelivery(tag))?;
        queue.acked += 1;
        Ok(())
    }

    async fn nack(&self, message: &Message, requeue: bool) -> Result<(), SpoolError> {
        let tag = Self::delivery_tag(message)?;
        let mut state = self.broker.state.lock().await;
        let queue = state.queue_mut(&self.name)?;
        let (seq, stored) = queue
            .unacked
            .remove(&tag)
            .ok_or(SpoolError::UnknownDelivery(tag))?;

        // Requeue under the original sequence number so the message goes back
        // to the head of its priority band.
        if requeue {
            queue.ready.push(ReadyEntry {
                priority: stored.priority(),
                seq,
                redelivered: true,
                message: stored,
            });
        } else {
            queue.dead_letters.push(stored);
        }
        Ok(())
    }

    async fn cancel(&self, consumer_tag: &ConsumerTag) -> Result<(), SpoolError> {
        self.cancelled.lock().await.push(consumer_tag.clone());
        Ok(())
    }
}

/// Publisher onto the in-memory broker.
#[derive(Clone)]
pub struct InMemoryPublisher {
    destination: String,
    broker: InMemoryBroker,
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, message: Message, destination: Option<&str>) -> Result<bool, SpoolError> {
        let destination = destination.unwrap_or(&self.destination);
        Ok(self.broker.publish_to(destination, message).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn fetch_body(queue: &InMemoryQueue) -> Option<Vec<u8>> {
        let message = queue.fetch().await.unwrap()?;
        queue.ack(&message).await.unwrap();
        Some(message.body().to_vec())
    }

    #[tokio::test]
    async fn fetch_is_fifo_and_non_blocking() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        queue.push("a").await;
        queue.push("b").await;

        assert_eq!(fetch_body(&queue).await, Some(b"a".to_vec()));
        assert_eq!(fetch_body(&queue).await, Some(b"b".to_vec()));
        assert_eq!(fetch_body(&queue).await, None);
    }

    #[tokio::test]
    async fn higher_priority_is_delivered_first() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        broker.publish_to("jobs", Message::new("low").with_priority(1)).await;
        broker.publish_to("jobs", Message::new("high").with_priority(5)).await;
        broker.publish_to("jobs", Message::new("low-2").with_priority(1)).await;

        assert_eq!(fetch_body(&queue).await, Some(b"high".to_vec()));
        assert_eq!(fetch_body(&queue).await, Some(b"low".to_vec()));
        assert_eq!(fetch_body(&queue).await, Some(b"low-2".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_messages_wait_for_their_time() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        broker
            .publish_to("jobs", Message::new("later").with_delay(Duration::from_secs(10)))
            .await;

        assert_eq!(queue.counts().await.scheduled, 1);
        assert_eq!(fetch_body(&queue).await, None);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fetch_body(&queue).await, Some(b"later".to_vec()));
    }

    #[tokio::test]
    async fn ack_and_nack_track_deliveries() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        queue.push("a").await;
        queue.push("b").await;

        let a = queue.fetch().await.unwrap().unwrap();
        assert!(a.delivery_tag().is_some());
        assert_eq!(queue.counts().await.unacked, 1);
        queue.nack(&a, true).await.unwrap();

        let redelivered = queue.fetch().await.unwrap().unwrap();
        assert_eq!(redelivered.body(), b"a");
        assert!(redelivered.is_redelivered());
        queue.nack(&redelivered, false).await.unwrap();

        let b = queue.fetch().await.unwrap().unwrap();
        queue.ack(&b).await.unwrap();

        let counts = queue.counts().await;
        assert_eq!(counts.acked, 1);
        assert_eq!(counts.dead_lettered, 1);
        assert_eq!(counts.unacked, 0);
        assert_eq!(broker.dead_letters("jobs").await[0].body(), b"a");
    }

    #[tokio::test]
    async fn requeued_delivery_returns_to_the_head() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        for payload in ["a", "b", "c"] {
            queue.push(payload).await;
        }

        let a = queue.fetch().await.unwrap().unwrap();
        let b = queue.fetch().await.unwrap().unwrap();
        queue.nack(&b, true).await.unwrap();
        queue.nack(&a, true).await.unwrap();

        assert_eq!(fetch_body(&queue).await, Some(b"a".to_vec()));
        assert_eq!(fetch_body(&queue).await, Some(b"b".to_vec()));
        assert_eq!(fetch_body(&queue).await, Some(b"c".to_vec()));
    }

    #[tokio::test]
    async fn double_ack_is_rejected() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        queue.push("a").await;

        let message = queue.fetch().await.unwrap().unwrap();
        queue.ack(&message).await.unwrap();
        assert!(matches!(
            queue.ack(&message).await,
            Err(SpoolError::UnknownDelivery(_))
        ));
        assert!(matches!(
            queue.ack(&Message::new("never fetched")).await,
            Err(SpoolError::NotDelivered)
        ));
    }

    #[tokio::test]
    async fn publisher_defaults_to_its_destination() {
        let broker = InMemoryBroker::new();
        let jobs = broker.queue("jobs").await;
        let retry = broker.queue("jobs.retry").await;
        let publisher = broker.publisher("jobs");

        assert!(publisher.publish(publisher.create_message(b"x".to_vec()), None).await.unwrap());
        assert!(publisher.publish(Message::new("y"), Some("jobs.retry")).await.unwrap());
        assert!(!publisher.publish(Message::new("z"), Some("nowhere")).await.unwrap());

        assert_eq!(jobs.counts().await.ready, 1);
        assert_eq!(retry.counts().await.ready, 1);
    }

    #[tokio::test]
    async fn fetch_after_cancel_fails() {
        let broker = InMemoryBroker::new();
        let queue = broker.queue("jobs").await;
        let tag = ConsumerTag::new("c-1");

        queue.cancel(&tag).await.unwrap();
        assert_eq!(queue.cancelled_tags().await, vec![tag]);
        assert!(queue.fetch().await.is_err());
    }
}
