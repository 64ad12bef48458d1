use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

use cinegate_core::repository::Notifier;
use cinegate_core::Booking;
use cinegate_shared::{BookingConfirmedEvent, ConfirmedTicket, Masked};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Build the confirmation payload. Tickets without a code are left out.
pub fn confirmation_event(booking: &Booking, timestamp: i64) -> BookingConfirmedEvent {
    let first = booking.tickets.first();
    BookingConfirmedEvent {
        booking_id: booking.id,
        user_id: booking.user_id.clone(),
        showtime_id: booking.showtime_id,
        movie_title: first.map(|t| t.movie_title.clone()).unwrap_or_default(),
        cinema_name: first.map(|t| t.cinema_name.clone()).unwrap_or_default(),
        starts_at: first.map(|t| t.starts_at).unwrap_or(booking.created_at),
        total_price: booking.total_price,
        tickets: booking
            .tickets
            .iter()
            .filter_map(|t| {
                t.redemption_code.as_ref().map(|code| ConfirmedTicket {
                    ticket_id: t.id,
                    seat_label: format!("{}-{:02}", t.seat_row, t.seat_number),
                    price: t.price,
                    redemption_code: Masked(code.clone()),
                })
            })
            .collect(),
        timestamp,
    }
}

/// Publishes booking confirmations to Kafka, keyed by booking id
pub struct KafkaNotifier {
    producer: EventProducer,
    topic: String,
}

impl KafkaNotifier {
    pub fn new(producer: EventProducer, topic: impl Into<String>) -> Self {
        Self { producer, topic: topic.into() }
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn booking_confirmed(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let event = confirmation_event(booking, chrono::Utc::now().timestamp());
        let payload = serde_json::to_string(&event)?;
        self.producer
            .publish(&self.topic, &booking.id.to_string(), &payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use cinegate_core::{
        BookingDraft, ReservationRequest, SeatLabel, ShowtimeDetails, Ticket,
    };
    use uuid::Uuid;

    #[test]
    fn test_confirmation_event_carries_issued_codes() {
        let now = Utc::now();
        let seat_ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let draft = BookingDraft::new(
            ReservationRequest { user_id: "user-1".into(), showtime_id: Uuid::new_v4(), seat_ids: seat_ids.clone() },
            now,
            Duration::minutes(15),
        );
        let details = ShowtimeDetails {
            showtime_id: draft.showtime_id,
            movie_title: "Arrival".to_string(),
            cinema_name: "Downtown".to_string(),
            screen_name: "Screen 1".to_string(),
            starts_at: now + Duration::days(1),
        };
        let mut tickets: Vec<Ticket> = seat_ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let label = SeatLabel { seat_id: *id, row: "A".to_string(), number: i as i32 + 1 };
                Ticket::pending(&draft, &details, &label, 100)
            })
            .collect();
        tickets[0].redemption_code = Some("CGT-CODE-ABCDEF".to_string());

        let booking = draft.into_booking(tickets).unwrap();
        let event = confirmation_event(&booking, 42);

        assert_eq!(event.movie_title, "Arrival");
        assert_eq!(event.total_price, 200);
        assert_eq!(event.tickets.len(), 1);
        assert_eq!(event.tickets[0].seat_label, "A-01");
        assert_eq!(event.tickets[0].redemption_code.expose(), "CGT-CODE-ABCDEF");
    }
}
