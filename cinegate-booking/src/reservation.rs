use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use cinegate_core::repository::{BookingRepository, CatalogLookup};
use cinegate_core::{Booking, BookingDraft, Clock, CoreError, CoreResult, ReservationRequest};

/// Limits applied to every reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    pub hold: Duration,
    pub max_seats: usize,
}

impl ReservationPolicy {
    pub fn new(hold: Duration, max_seats: usize) -> Self {
        Self { hold, max_seats }
    }
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(15), 10)
    }
}

/// Claims seats for a user and records the Pending booking.
///
/// The engine holds no lock of its own. Two overlapping requests race in the
/// repository's conditional seat update and the first committer wins. Seat
/// ids the showtime does not carry lose that race too and are reported as
/// unavailable.
pub struct ReservationEngine {
    bookings: Arc<dyn BookingRepository>,
    catalog: Arc<dyn CatalogLookup>,
    clock: Arc<dyn Clock>,
    policy: ReservationPolicy,
}

impl ReservationEngine {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        catalog: Arc<dyn CatalogLookup>,
        clock: Arc<dyn Clock>,
        policy: ReservationPolicy,
    ) -> Self {
        Self { bookings, catalog, clock, policy }
    }

    pub async fn reserve(&self, request: ReservationRequest) -> CoreResult<Booking> {
        request.validate(self.policy.max_seats)?;

        let showtime_id = request.showtime_id;
        let details = self
            .catalog
            .showtime_details(showtime_id)
            .await?
            .ok_or(CoreError::ShowtimeNotFound(showtime_id))?;

        let labels = self.catalog.seat_labels(&request.seat_ids).await?;

        let draft = BookingDraft::new(request, self.clock.now(), self.policy.hold);
        debug!(booking_id = %draft.id, seats = draft.seat_ids.len(), "Claiming seats");

        let booking = self.bookings.reserve(&draft, &details, &labels).await?;
        info!(
            booking_id = %booking.id,
            showtime_id = %booking.showtime_id,
            total_price = booking.total_price,
            "Booking created, awaiting payment"
        );
        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(id)
            .await?
            .ok_or(CoreError::BookingNotFound(id))
    }

    pub async fn list_bookings(&self, user_id: Option<&str>) -> CoreResult<Vec<Booking>> {
        self.bookings.list_bookings(user_id).await
    }
}
