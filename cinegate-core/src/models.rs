use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

// Status columns are stored as SMALLINT codes. The codes below are the only
// mapping between storage and the enums; JSON uses the variant names.

/// Physical seat category, drives the price multiplier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Normal,
    Vip,
    Couple,
}

impl SeatType {
    pub fn code(self) -> i16 {
        match self {
            SeatType::Normal => 0,
            SeatType::Vip => 1,
            SeatType::Couple => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeatType::Normal => "NORMAL",
            SeatType::Vip => "VIP",
            SeatType::Couple => "COUPLE",
        }
    }
}

impl TryFrom<i16> for SeatType {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SeatType::Normal),
            1 => Ok(SeatType::Vip),
            2 => Ok(SeatType::Couple),
            _ => Err(CoreError::UnknownStatus { entity: "seat type", code }),
        }
    }
}

/// Inventory state of one seat for one showtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    Available,
    Locked,
    Sold,
}

impl SeatStatus {
    pub fn code(self) -> i16 {
        match self {
            SeatStatus::Available => 0,
            SeatStatus::Locked => 1,
            SeatStatus::Sold => 2,
        }
    }
}

impl TryFrom<i16> for SeatStatus {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(SeatStatus::Available),
            1 => Ok(SeatStatus::Locked),
            2 => Ok(SeatStatus::Sold),
            _ => Err(CoreError::UnknownStatus { entity: "seat", code }),
        }
    }
}

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Failed,
}

impl BookingStatus {
    pub fn code(self) -> i16 {
        match self {
            BookingStatus::Pending => 0,
            BookingStatus::Confirmed => 1,
            BookingStatus::Cancelled => 2,
            BookingStatus::Failed => 3,
        }
    }

    pub fn is_pending(self) -> bool {
        self == BookingStatus::Pending
    }
}

impl TryFrom<i16> for BookingStatus {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(BookingStatus::Pending),
            1 => Ok(BookingStatus::Confirmed),
            2 => Ok(BookingStatus::Cancelled),
            3 => Ok(BookingStatus::Failed),
            _ => Err(CoreError::UnknownStatus { entity: "booking", code }),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Ticket status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
}

impl TicketStatus {
    pub fn code(self) -> i16 {
        match self {
            TicketStatus::Active => 0,
            TicketStatus::Used => 1,
            TicketStatus::Cancelled => 2,
        }
    }
}

impl TryFrom<i16> for TicketStatus {
    type Error = CoreError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TicketStatus::Active),
            1 => Ok(TicketStatus::Used),
            2 => Ok(TicketStatus::Cancelled),
            _ => Err(CoreError::UnknownStatus { entity: "ticket", code }),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Used => "USED",
            TicketStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// Static seat catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: Uuid,
    pub auditorium_id: Uuid,
    pub row: String,
    pub number: i32,
    pub seat_type: SeatType,
}

impl Seat {
    /// Display label, e.g. `A-07`
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.row, self.number)
    }
}

/// A scheduled screening with its own inventory and base price (minor units)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub cinema_id: Uuid,
    pub auditorium_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub base_price: i64,
}

impl Showtime {
    pub fn validate(&self) -> CoreResult<()> {
        let refs = [
            ("id", self.id),
            ("movie_id", self.movie_id),
            ("cinema_id", self.cinema_id),
            ("auditorium_id", self.auditorium_id),
        ];
        if let Some((name, _)) = refs.iter().find(|(_, id)| id.is_nil()) {
            return Err(CoreError::Validation(format!("showtime {name} must not be empty")));
        }
        if self.starts_at >= self.ends_at {
            return Err(CoreError::Validation(format!(
                "showtime {} must start before it ends",
                self.id
            )));
        }
        if self.base_price < 0 {
            return Err(CoreError::Validation(format!(
                "showtime {} has a negative base price",
                self.id
            )));
        }
        Ok(())
    }
}

/// Inventory unit: one seat for one showtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowtimeSeat {
    pub seat_id: Uuid,
    pub showtime_id: Uuid,
    pub status: SeatStatus,
    pub price: i64,
    pub booking_id: Option<Uuid>,
}

/// Seat-map entry for display, joins inventory with the seat catalog
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SeatView {
    pub seat_id: Uuid,
    pub label: String,
    pub row: String,
    pub number: i32,
    pub type_code: &'static str,
    pub status: SeatStatus,
    pub status_text: &'static str,
    pub price: i64,
}

impl SeatView {
    pub fn new(inventory: &ShowtimeSeat, seat: &Seat) -> Self {
        let status_text = match inventory.status {
            SeatStatus::Available => "Available",
            SeatStatus::Locked => "Reserved",
            SeatStatus::Sold => "Sold",
        };
        Self {
            seat_id: inventory.seat_id,
            label: seat.label(),
            row: seat.row.clone(),
            number: seat.number,
            type_code: seat.seat_type.as_str(),
            status: inventory.status,
            status_text,
            price: inventory.price,
        }
    }
}

/// Display data resolved from the catalog when tickets are created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShowtimeDetails {
    pub showtime_id: Uuid,
    pub movie_title: String,
    pub cinema_name: String,
    pub screen_name: String,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatLabel {
    pub seat_id: Uuid,
    pub row: String,
    pub number: i32,
}

/// Client request to reserve seats
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationRequest {
    pub user_id: String,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
}

impl ReservationRequest {
    pub fn validate(&self, max_seats: usize) -> CoreResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::Validation("user_id must not be empty".into()));
        }
        if self.showtime_id.is_nil() {
            return Err(CoreError::Validation("showtime_id must not be empty".into()));
        }
        if self.seat_ids.is_empty() {
            return Err(CoreError::Validation("at least one seat is required".into()));
        }
        if self.seat_ids.len() > max_seats {
            return Err(CoreError::Validation(format!(
                "at most {max_seats} seats per booking, got {}",
                self.seat_ids.len()
            )));
        }
        let mut seen = HashSet::with_capacity(self.seat_ids.len());
        for seat_id in &self.seat_ids {
            if seat_id.is_nil() {
                return Err(CoreError::Validation("seat id must not be empty".into()));
            }
            if !seen.insert(seat_id) {
                return Err(CoreError::Validation(format!("seat {seat_id} requested twice")));
            }
        }
        Ok(())
    }
}

/// A validated reservation with its identity and hold window fixed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub id: Uuid,
    pub user_id: String,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BookingDraft {
    pub fn new(request: ReservationRequest, now: DateTime<Utc>, hold: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            showtime_id: request.showtime_id,
            seat_ids: request.seat_ids,
            created_at: now,
            expires_at: now + hold,
        }
    }

    /// Materialize the booking once seats are claimed and tickets built
    pub fn into_booking(self, tickets: Vec<Ticket>) -> CoreResult<Booking> {
        let total_price = tickets
            .iter()
            .try_fold(0i64, |total, t| total.checked_add(t.price))
            .ok_or_else(|| CoreError::Validation(format!("booking {} total overflows", self.id)))?;
        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            showtime_id: self.showtime_id,
            seat_ids: self.seat_ids,
            tickets,
            total_price,
            status: BookingStatus::Pending,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

/// A user's claim over a set of showtime seats
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: String,
    pub showtime_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub tickets: Vec<Ticket>,
    pub total_price: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_pending() && self.expires_at <= now
    }
}

/// Redeemable artifact, one per claimed seat
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub showtime_id: Uuid,
    pub seat_id: Uuid,
    pub movie_title: String,
    pub cinema_name: String,
    pub screen_name: String,
    pub starts_at: DateTime<Utc>,
    pub seat_row: String,
    pub seat_number: i32,
    pub redemption_code: Option<String>,
    pub price: i64,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Provisional ticket created alongside the seat lock. No redemption
    /// code until the booking is settled.
    pub fn pending(
        draft: &BookingDraft,
        details: &ShowtimeDetails,
        label: &SeatLabel,
        price: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id: draft.id,
            showtime_id: draft.showtime_id,
            seat_id: label.seat_id,
            movie_title: details.movie_title.clone(),
            cinema_name: details.cinema_name.clone(),
            screen_name: details.screen_name.clone(),
            starts_at: details.starts_at,
            seat_row: label.row.clone(),
            seat_number: label.number,
            redemption_code: None,
            price,
            status: TicketStatus::Active,
            created_at: draft.created_at,
            redeemed_at: None,
        }
    }

    pub fn is_issued(&self) -> bool {
        self.redemption_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seats: Vec<Uuid>) -> ReservationRequest {
        ReservationRequest {
            user_id: "user-1".to_string(),
            showtime_id: Uuid::new_v4(),
            seat_ids: seats,
        }
    }

    #[test]
    fn test_status_codes_are_stable() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Failed,
        ] {
            assert_eq!(BookingStatus::try_from(status.code()).unwrap(), status);
        }
        assert_eq!(BookingStatus::Failed.code(), 3);
        assert_eq!(SeatStatus::Sold.code(), 2);
        assert_eq!(TicketStatus::Used.code(), 1);
        assert_eq!(SeatType::Couple.code(), 2);
    }

    #[test]
    fn test_unknown_status_code_is_rejected() {
        let err = SeatStatus::try_from(7).unwrap_err();
        assert!(matches!(err, CoreError::UnknownStatus { entity: "seat", code: 7 }));
        assert!(TicketStatus::try_from(-1).is_err());
    }

    #[test]
    fn test_status_json_names() {
        assert_eq!(serde_json::to_string(&BookingStatus::Confirmed).unwrap(), "\"CONFIRMED\"");
        assert_eq!(serde_json::to_string(&SeatType::Vip).unwrap(), "\"VIP\"");
        let parsed: TicketStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(parsed, TicketStatus::Cancelled);
    }

    #[test]
    fn test_reservation_validation() {
        assert!(request(vec![Uuid::new_v4(), Uuid::new_v4()]).validate(10).is_ok());

        let err = request(vec![]).validate(10).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let seat = Uuid::new_v4();
        assert!(request(vec![seat, seat]).validate(10).is_err());
        assert!(request(vec![Uuid::nil()]).validate(10).is_err());
        assert!(request(vec![Uuid::new_v4(), Uuid::new_v4()]).validate(1).is_err());

        let mut anonymous = request(vec![Uuid::new_v4()]);
        anonymous.user_id = "  ".to_string();
        assert!(anonymous.validate(10).is_err());
    }

    #[test]
    fn test_showtime_validation() {
        let start = Utc::now();
        let mut showtime = Showtime {
            id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            cinema_id: Uuid::new_v4(),
            auditorium_id: Uuid::new_v4(),
            starts_at: start,
            ends_at: start + Duration::minutes(120),
            base_price: 100,
        };
        assert!(showtime.validate().is_ok());

        showtime.ends_at = start;
        assert!(showtime.validate().is_err());

        showtime.ends_at = start + Duration::minutes(90);
        showtime.movie_id = Uuid::nil();
        let err = showtime.validate().unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: showtime movie_id must not be empty");
    }

    #[test]
    fn test_draft_hold_window_and_total() {
        let now = Utc::now();
        let draft = BookingDraft::new(request(vec![Uuid::new_v4()]), now, Duration::minutes(15));
        assert_eq!(draft.expires_at - draft.created_at, Duration::minutes(15));

        let details = ShowtimeDetails {
            showtime_id: draft.showtime_id,
            movie_title: "Arrival".to_string(),
            cinema_name: "Downtown".to_string(),
            screen_name: "Screen 1".to_string(),
            starts_at: now,
        };
        let label = SeatLabel { seat_id: draft.seat_ids[0], row: "A".to_string(), number: 1 };
        let ticket = Ticket::pending(&draft, &details, &label, 150);
        assert!(!ticket.is_issued());
        assert_eq!(ticket.status, TicketStatus::Active);

        let booking = draft.into_booking(vec![ticket]).unwrap();
        assert_eq!(booking.total_price, 150);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.is_expired(now + Duration::minutes(15)));
        assert!(!booking.is_expired(now + Duration::minutes(14)));
    }

    #[test]
    fn test_draft_total_overflow_is_rejected() {
        let now = Utc::now();
        let draft = BookingDraft::new(
            request(vec![Uuid::new_v4(), Uuid::new_v4()]),
            now,
            Duration::minutes(15),
        );
        let details = ShowtimeDetails {
            showtime_id: draft.showtime_id,
            movie_title: "Arrival".to_string(),
            cinema_name: "Downtown".to_string(),
            screen_name: "Screen 1".to_string(),
            starts_at: now,
        };
        let tickets: Vec<Ticket> = draft
            .seat_ids
            .iter()
            .map(|id| {
                let label = SeatLabel { seat_id: *id, row: "A".to_string(), number: 1 };
                Ticket::pending(&draft, &details, &label, i64::MAX / 2 + 1)
            })
            .collect();

        let err = draft.into_booking(tickets).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_seat_view_labels() {
        let seat = Seat {
            id: Uuid::new_v4(),
            auditorium_id: Uuid::new_v4(),
            row: "C".to_string(),
            number: 7,
            seat_type: SeatType::Vip,
        };
        let inventory = ShowtimeSeat {
            seat_id: seat.id,
            showtime_id: Uuid::new_v4(),
            status: SeatStatus::Locked,
            price: 150,
            booking_id: Some(Uuid::new_v4()),
        };
        let view = SeatView::new(&inventory, &seat);
        assert_eq!(view.label, "C-07");
        assert_eq!(view.status_text, "Reserved");
        assert_eq!(view.type_code, "VIP");
    }
}
