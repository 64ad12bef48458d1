//! In-memory implementation of the storage traits.
//!
//! Each trait call holds the store mutex for its whole duration, which plays
//! the role of a database transaction: checks run first and state is only
//! written once every check passed, so a failed call leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;
use uuid::Uuid;

use cinegate_core::redemption::issue_code;
use cinegate_core::repository::{BookingRepository, CatalogLookup, InventoryRepository, Notifier};
use cinegate_core::{
    Booking, BookingDraft, BookingStatus, CoreError, CoreResult, PaymentOutcome, Seat, SeatLabel,
    SeatStatus, SeatType, Settlement, Showtime, ShowtimeDetails, ShowtimeSeat, Ticket,
    TicketStatus,
};

struct Auditorium {
    name: String,
    seats: Vec<Uuid>,
}

#[derive(Default)]
struct Inner {
    movies: HashMap<Uuid, String>,
    cinemas: HashMap<Uuid, String>,
    auditoriums: HashMap<Uuid, Auditorium>,
    seats: HashMap<Uuid, Seat>,
    showtimes: HashMap<Uuid, Showtime>,
    inventory: BTreeMap<(Uuid, Uuid), ShowtimeSeat>,
    bookings: HashMap<Uuid, Booking>,
}

impl Inner {
    fn release_seats(&mut self, booking: &Booking) {
        for seat_id in &booking.seat_ids {
            if let Some(seat) = self.inventory.get_mut(&(booking.showtime_id, *seat_id)) {
                if seat.booking_id == Some(booking.id) && seat.status == SeatStatus::Locked {
                    seat.status = SeatStatus::Available;
                    seat.booking_id = None;
                }
            }
        }
    }
}

/// Catalog, inventory and bookings held in process memory
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next mutating call fail with a persistence error before it
    /// writes anything.
    pub fn fail_next_write(&self) {
        self.fail_writes(1);
    }

    /// Like `fail_next_write`, for the next `count` mutating calls
    pub fn fail_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    fn check_write(&self) -> CoreResult<()> {
        let pending = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(CoreError::persistence("injected write failure"));
        }
        Ok(())
    }

    pub async fn add_movie(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().await.movies.insert(id, title.to_string());
        id
    }

    pub async fn add_cinema(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().await.cinemas.insert(id, name.to_string());
        id
    }

    /// Register an auditorium with its seat layout `(row, number, type)`
    pub async fn add_auditorium(&self, name: &str, layout: &[(&str, i32, SeatType)]) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().await;
        let mut seat_ids = Vec::with_capacity(layout.len());
        for (row, number, seat_type) in layout {
            let seat = Seat {
                id: Uuid::new_v4(),
                auditorium_id: id,
                row: row.to_string(),
                number: *number,
                seat_type: *seat_type,
            };
            seat_ids.push(seat.id);
            inner.seats.insert(seat.id, seat);
        }
        inner.auditoriums.insert(id, Auditorium { name: name.to_string(), seats: seat_ids });
        id
    }

    pub async fn seat(&self, showtime_id: Uuid, seat_id: Uuid) -> Option<ShowtimeSeat> {
        self.inner.lock().await.inventory.get(&(showtime_id, seat_id)).cloned()
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn reserve(
        &self,
        draft: &BookingDraft,
        details: &ShowtimeDetails,
        labels: &HashMap<Uuid, SeatLabel>,
    ) -> CoreResult<Booking> {
        let mut inner = self.inner.lock().await;

        let requested = draft.seat_ids.len();
        let claimed = draft
            .seat_ids
            .iter()
            .filter(|seat_id| {
                inner
                    .inventory
                    .get(&(draft.showtime_id, **seat_id))
                    .is_some_and(|s| s.status == SeatStatus::Available)
            })
            .count();
        if claimed < requested {
            return Err(CoreError::SeatsUnavailable { requested, claimed });
        }
        self.check_write()?;

        let mut tickets = Vec::with_capacity(requested);
        for seat_id in &draft.seat_ids {
            let label = labels
                .get(seat_id)
                .ok_or_else(|| CoreError::Validation(format!("unknown seat {seat_id}")))?;
            let price = inner.inventory[&(draft.showtime_id, *seat_id)].price;
            tickets.push(Ticket::pending(draft, details, label, price));
        }
        let booking = draft.clone().into_booking(tickets)?;

        for seat_id in &draft.seat_ids {
            if let Some(seat) = inner.inventory.get_mut(&(draft.showtime_id, *seat_id)) {
                seat.status = SeatStatus::Locked;
                seat.booking_id = Some(draft.id);
            }
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn settle(&self, booking_id: Uuid, outcome: PaymentOutcome) -> CoreResult<Settlement> {
        let mut inner = self.inner.lock().await;

        let mut booking = inner
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(CoreError::BookingNotFound(booking_id))?;
        if !booking.status.is_pending() {
            return Ok(Settlement::AlreadySettled { status: booking.status });
        }
        self.check_write()?;

        let status = outcome.target_status();
        booking.status = status;
        match outcome {
            PaymentOutcome::Success => {
                for seat_id in &booking.seat_ids {
                    if let Some(seat) = inner.inventory.get_mut(&(booking.showtime_id, *seat_id)) {
                        if seat.booking_id == Some(booking.id) && seat.status == SeatStatus::Locked {
                            seat.status = SeatStatus::Sold;
                        }
                    }
                }
                for ticket in &mut booking.tickets {
                    ticket.status = TicketStatus::Active;
                    ticket.redemption_code = Some(issue_code(ticket.id));
                }
            }
            PaymentOutcome::Failed => {
                inner.release_seats(&booking);
                for ticket in &mut booking.tickets {
                    ticket.status = TicketStatus::Cancelled;
                }
            }
        }

        inner.bookings.insert(booking.id, booking);
        Ok(Settlement::Applied { status })
    }

    async fn redeem(&self, code: &str, at: DateTime<Utc>) -> CoreResult<Ticket> {
        let mut inner = self.inner.lock().await;

        let ticket = inner
            .bookings
            .values_mut()
            .flat_map(|b| b.tickets.iter_mut())
            .find(|t| t.redemption_code.as_deref() == Some(code))
            .ok_or_else(|| CoreError::TicketNotFound(code.to_string()))?;
        if ticket.status != TicketStatus::Active {
            return Err(CoreError::TicketNotActive { status: ticket.status });
        }
        self.check_write()?;

        ticket.status = TicketStatus::Used;
        ticket.redeemed_at = Some(at);
        Ok(ticket.clone())
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.inner.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, user_id: Option<&str>) -> CoreResult<Vec<Booking>> {
        let inner = self.inner.lock().await;
        let mut bookings: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| user_id.map_or(true, |u| b.user_id == u))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>> {
        let mut inner = self.inner.lock().await;

        let mut due: Vec<(DateTime<Utc>, Uuid)> = inner
            .bookings
            .values()
            .filter(|b| b.status.is_pending() && b.expires_at <= cutoff)
            .map(|b| (b.expires_at, b.id))
            .collect();
        due.sort();
        due.truncate(usize::try_from(limit).unwrap_or(0));
        if due.is_empty() {
            return Ok(Vec::new());
        }
        self.check_write()?;

        let mut expired = Vec::with_capacity(due.len());
        for (_, id) in due {
            let Some(mut booking) = inner.bookings.get(&id).cloned() else {
                continue;
            };
            booking.status = BookingStatus::Cancelled;
            inner.release_seats(&booking);
            for ticket in &mut booking.tickets {
                ticket.status = TicketStatus::Cancelled;
            }
            inner.bookings.insert(id, booking);
            expired.push(id);
        }
        Ok(expired)
    }
}

#[async_trait]
impl InventoryRepository for MemoryStore {
    async fn provision(&self, showtime: &Showtime, seats: &[ShowtimeSeat]) -> CoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.showtimes.contains_key(&showtime.id) {
            return Err(CoreError::Validation(format!(
                "showtime {} already provisioned",
                showtime.id
            )));
        }
        self.check_write()?;

        inner.showtimes.insert(showtime.id, showtime.clone());
        for seat in seats {
            inner.inventory.insert((seat.showtime_id, seat.seat_id), seat.clone());
        }
        Ok(())
    }

    async fn get_showtime(&self, id: Uuid) -> CoreResult<Option<Showtime>> {
        Ok(self.inner.lock().await.showtimes.get(&id).cloned())
    }

    async fn list_showtimes(&self) -> CoreResult<Vec<Showtime>> {
        let inner = self.inner.lock().await;
        let mut showtimes: Vec<Showtime> = inner.showtimes.values().cloned().collect();
        showtimes.sort_by_key(|s| s.starts_at);
        Ok(showtimes)
    }

    async fn list_showtime_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<ShowtimeSeat>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .inventory
            .values()
            .filter(|seat| seat.showtime_id == showtime_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogLookup for MemoryStore {
    async fn showtime_details(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>> {
        let inner = self.inner.lock().await;
        let Some(showtime) = inner.showtimes.get(&showtime_id) else {
            return Ok(None);
        };
        let auditorium = inner.auditoriums.get(&showtime.auditorium_id);
        Ok(Some(ShowtimeDetails {
            showtime_id,
            movie_title: inner.movies.get(&showtime.movie_id).cloned().unwrap_or_default(),
            cinema_name: inner.cinemas.get(&showtime.cinema_id).cloned().unwrap_or_default(),
            screen_name: auditorium.map(|a| a.name.clone()).unwrap_or_default(),
            starts_at: showtime.starts_at,
        }))
    }

    async fn seat_labels(&self, seat_ids: &[Uuid]) -> CoreResult<HashMap<Uuid, SeatLabel>> {
        let inner = self.inner.lock().await;
        Ok(seat_ids
            .iter()
            .filter_map(|id| inner.seats.get(id))
            .map(|seat| {
                let label = SeatLabel { seat_id: seat.id, row: seat.row.clone(), number: seat.number };
                (seat.id, label)
            })
            .collect())
    }

    async fn auditorium_seats(&self, auditorium_id: Uuid) -> CoreResult<Vec<Seat>> {
        let inner = self.inner.lock().await;
        let Some(auditorium) = inner.auditoriums.get(&auditorium_id) else {
            return Ok(Vec::new());
        };
        Ok(auditorium
            .seats
            .iter()
            .filter_map(|id| inner.seats.get(id).cloned())
            .collect())
    }
}

/// Notifier that keeps confirmed bookings for inspection
#[derive(Default)]
pub struct RecordingNotifier {
    confirmed: StdMutex<Vec<Booking>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every dispatch fails
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn confirmed(&self) -> Vec<Booking> {
        self.confirmed.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn booking_confirmed(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.failing {
            return Err("mail relay unavailable".into());
        }
        self.confirmed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(booking.clone());
        Ok(())
    }
}
