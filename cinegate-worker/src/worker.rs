use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::handlers::MessageHandler;

pub fn create_consumer(brokers: &str, group_id: &str) -> Result<StreamConsumer, rdkafka::error::KafkaError> {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()
}

/// Backoff between attempts at a message that failed on storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { initial: Duration::from_millis(200), max: Duration::from_secs(30) }
    }
}

impl RetryPolicy {
    /// Doubles per attempt, capped at `max`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max)
    }
}

/// What became of a consumed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Handled,
    /// Permanently bad: malformed, misrouted or refused by the domain
    Rejected,
    /// Shutdown arrived while storage was still failing
    Interrupted,
}

impl Disposition {
    pub fn should_commit(self) -> bool {
        !matches!(self, Disposition::Interrupted)
    }
}

/// Consume payment and scheduling topics until shutdown.
///
/// Offsets are committed only after a message was handled or judged
/// permanently bad. Storage failures are retried until they clear, and a
/// message still failing at shutdown stays uncommitted so it is redelivered.
pub async fn run_consumer(
    consumer: StreamConsumer,
    handler: Arc<MessageHandler>,
    retry: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), rdkafka::error::KafkaError> {
    consumer.subscribe(&handler.subscriptions())?;
    info!(topics = ?handler.subscriptions(), "Consumer started");

    loop {
        let message = tokio::select! {
            received = consumer.recv() => received,
            _ = shutdown.changed() => {
                info!("Consumer stopping");
                return Ok(());
            }
        };

        let m = match message {
            Ok(m) => m,
            Err(e) => {
                error!("Kafka error: {}", e);
                continue;
            }
        };

        let disposition = match m.payload_view::<str>() {
            Some(Ok(payload)) => process(&handler, m.topic(), payload, retry, &mut shutdown).await,
            Some(Err(e)) => {
                error!("Error reading payload: {}", e);
                Disposition::Rejected
            }
            None => {
                warn!(topic = m.topic(), "Empty message skipped");
                Disposition::Rejected
            }
        };

        if !disposition.should_commit() {
            warn!(topic = m.topic(), offset = m.offset(), "Leaving message uncommitted for redelivery");
            return Ok(());
        }
        if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
            error!("Failed to commit offset: {}", e);
        }
    }
}

pub async fn process(
    handler: &MessageHandler,
    topic: &str,
    payload: &str,
    retry: RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Disposition {
    let mut attempt = 1;
    loop {
        match handler.handle(topic, payload).await {
            Ok(()) => return Disposition::Handled,
            Err(e) if e.is_retryable() => {
                if *shutdown.borrow() {
                    return Disposition::Interrupted;
                }
                let backoff = retry.delay(attempt);
                warn!(topic, attempt, "Handler failed, retrying in {:?}: {}", backoff, e);
                tokio::select! {
                    _ = sleep(backoff) => {}
                    _ = shutdown.changed() => return Disposition::Interrupted,
                }
                attempt = attempt.saturating_add(1);
            }
            Err(e) => {
                error!(topic, "Dropping message: {}", e);
                return Disposition::Rejected;
            }
        }
    }
}
