use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::pii::Masked;

/// Inbound payment provider callback. Delivered at least once, in any order.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentNotification {
    pub booking_id: Uuid,
    pub payment_status: String, // "SUCCESS" | "FAILED"
    pub transaction_id: Masked<String>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ConfirmedTicket {
    pub ticket_id: Uuid,
    pub seat_label: String,
    pub price: i64,
    pub redemption_code: Masked<String>,
}

/// Published once a booking is confirmed, consumed by the mailer
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub user_id: String,
    pub showtime_id: Uuid,
    pub movie_title: String,
    pub cinema_name: String,
    pub starts_at: DateTime<Utc>,
    pub total_price: i64,
    pub tickets: Vec<ConfirmedTicket>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ScheduledShowtime {
    pub showtime_id: Uuid,
    pub movie_id: Uuid,
    pub cinema_id: Uuid,
    pub auditorium_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub base_price: i64,
}

/// Request from the scheduling back office to open inventory for showtimes
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ShowtimeScheduledEvent {
    pub showtimes: Vec<ScheduledShowtime>,
    pub timestamp: i64,
}
