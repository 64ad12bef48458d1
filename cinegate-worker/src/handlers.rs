use std::sync::Arc;
use tracing::{info, warn};

use cinegate_booking::{ProvisioningService, SettlementEngine};
use cinegate_core::{CoreError, Settlement, Showtime};
use cinegate_shared::{PaymentNotification, ShowtimeScheduledEvent};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Malformed payload on {topic}: {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("No handler for topic {0}")]
    UnknownTopic(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl HandlerError {
    /// Redelivering the same message can only help for storage failures
    pub fn is_retryable(&self) -> bool {
        match self {
            HandlerError::Core(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Topics {
    pub payment: String,
    pub showtime: String,
}

/// Routes consumed messages to the engines
pub struct MessageHandler {
    topics: Topics,
    settlement: Arc<SettlementEngine>,
    provisioning: Arc<ProvisioningService>,
}

impl MessageHandler {
    pub fn new(
        topics: Topics,
        settlement: Arc<SettlementEngine>,
        provisioning: Arc<ProvisioningService>,
    ) -> Self {
        Self { topics, settlement, provisioning }
    }

    pub fn subscriptions(&self) -> [&str; 2] {
        [self.topics.payment.as_str(), self.topics.showtime.as_str()]
    }

    pub async fn handle(&self, topic: &str, payload: &str) -> Result<(), HandlerError> {
        if topic == self.topics.payment {
            let notification: PaymentNotification = decode(topic, payload)?;
            let settlement = self.settlement.handle_notification(&notification).await?;
            if let Settlement::AlreadySettled { status } = settlement {
                info!(booking_id = %notification.booking_id, status = %status, "Acknowledged duplicate payment notification");
            }
            Ok(())
        } else if topic == self.topics.showtime {
            let event: ShowtimeScheduledEvent = decode(topic, payload)?;
            let showtimes: Vec<Showtime> = event
                .showtimes
                .into_iter()
                .map(|s| Showtime {
                    id: s.showtime_id,
                    movie_id: s.movie_id,
                    cinema_id: s.cinema_id,
                    auditorium_id: s.auditorium_id,
                    starts_at: s.starts_at,
                    ends_at: s.ends_at,
                    base_price: s.base_price,
                })
                .collect();
            let provisioned = self.provisioning.provision(showtimes).await?;
            info!(count = provisioned.len(), "Showtimes opened for sale");
            Ok(())
        } else {
            warn!("Message on unexpected topic {}", topic);
            Err(HandlerError::UnknownTopic(topic.to_string()))
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(topic: &str, payload: &str) -> Result<T, HandlerError> {
    serde_json::from_str(payload).map_err(|source| HandlerError::Decode {
        topic: topic.to_string(),
        source,
    })
}
