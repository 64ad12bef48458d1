use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    Booking, BookingDraft, CoreResult, PaymentOutcome, Seat, SeatLabel, Settlement, Showtime,
    ShowtimeDetails, ShowtimeSeat, Ticket,
};

/// Transactional booking storage.
///
/// Every mutating method is one atomic unit: either all rows it touches move
/// to their new state or none do.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Claim every requested seat for the draft and persist the Pending
    /// booking with one provisional ticket per seat. Fails with
    /// `SeatsUnavailable` and no effect if any seat is not Available.
    async fn reserve(
        &self,
        draft: &BookingDraft,
        details: &ShowtimeDetails,
        labels: &HashMap<Uuid, SeatLabel>,
    ) -> CoreResult<Booking>;

    /// Apply a payment outcome to a Pending booking, serialized on the
    /// booking row. Non-Pending bookings are reported as already settled.
    async fn settle(&self, booking_id: Uuid, outcome: PaymentOutcome) -> CoreResult<Settlement>;

    /// Consume the ticket holding `code`, exactly once.
    async fn redeem(&self, code: &str, at: DateTime<Utc>) -> CoreResult<Ticket>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_bookings(&self, user_id: Option<&str>) -> CoreResult<Vec<Booking>>;

    /// Cancel up to `limit` Pending bookings that expired at or before
    /// `cutoff`, releasing their seats. Rows locked by another transaction
    /// are skipped.
    async fn expire_pending(&self, cutoff: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>>;
}

/// Showtime inventory storage
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Persist the showtime together with all of its seats in one transaction
    async fn provision(&self, showtime: &Showtime, seats: &[ShowtimeSeat]) -> CoreResult<()>;

    async fn get_showtime(&self, id: Uuid) -> CoreResult<Option<Showtime>>;

    async fn list_showtimes(&self) -> CoreResult<Vec<Showtime>>;

    async fn list_showtime_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<ShowtimeSeat>>;
}

/// Read-only access to movies, venues and the static seat catalog
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn showtime_details(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>>;

    async fn seat_labels(&self, seat_ids: &[Uuid]) -> CoreResult<HashMap<Uuid, SeatLabel>>;

    async fn auditorium_seats(&self, auditorium_id: Uuid) -> CoreResult<Vec<Seat>>;
}

/// Outbound confirmation channel. Called only after a confirmation commits.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
