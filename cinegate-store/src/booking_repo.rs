use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use cinegate_core::redemption::issue_code;
use cinegate_core::repository::BookingRepository;
use cinegate_core::{
    Booking, BookingDraft, BookingStatus, CoreError, CoreResult, PaymentOutcome, SeatLabel,
    SeatStatus, Settlement, ShowtimeDetails, Ticket, TicketStatus,
};

use crate::error::DbResultExt;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: String,
    showtime_id: Uuid,
    seat_ids: Vec<Uuid>,
    total_price: i64,
    status: i16,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, tickets: Vec<Ticket>) -> CoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            user_id: self.user_id,
            showtime_id: self.showtime_id,
            seat_ids: self.seat_ids,
            tickets,
            total_price: self.total_price,
            status: BookingStatus::try_from(self.status)?,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    booking_id: Uuid,
    showtime_id: Uuid,
    seat_id: Uuid,
    movie_title: String,
    cinema_name: String,
    screen_name: String,
    starts_at: DateTime<Utc>,
    seat_row: String,
    seat_number: i32,
    redemption_code: Option<String>,
    price: i64,
    status: i16,
    created_at: DateTime<Utc>,
    redeemed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = CoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id,
            booking_id: row.booking_id,
            showtime_id: row.showtime_id,
            seat_id: row.seat_id,
            movie_title: row.movie_title,
            cinema_name: row.cinema_name,
            screen_name: row.screen_name,
            starts_at: row.starts_at,
            seat_row: row.seat_row,
            seat_number: row.seat_number,
            redemption_code: row.redemption_code,
            price: row.price,
            status: TicketStatus::try_from(row.status)?,
            created_at: row.created_at,
            redeemed_at: row.redeemed_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ClaimedSeat {
    seat_id: Uuid,
    price: i64,
}

const BOOKING_COLUMNS: &str =
    "id, user_id, showtime_id, seat_ids, total_price, status, created_at, expires_at";

const TICKET_COLUMNS: &str = "id, booking_id, showtime_id, seat_id, movie_title, cinema_name, \
     screen_name, starts_at, seat_row, seat_number, redemption_code, price, status, created_at, \
     redeemed_at";

/// Return every Locked seat of the given bookings to the pool and cancel
/// their tickets.
async fn release_bookings(conn: &mut PgConnection, booking_ids: &[Uuid]) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE showtime_seats
        SET status = $2, booking_id = NULL
        WHERE booking_id = ANY($1) AND status = $3
        "#,
    )
    .bind(booking_ids)
    .bind(SeatStatus::Available.code())
    .bind(SeatStatus::Locked.code())
    .execute(&mut *conn)
    .await
    .db()?;

    sqlx::query("UPDATE tickets SET status = $2 WHERE booking_id = ANY($1)")
        .bind(booking_ids)
        .bind(TicketStatus::Cancelled.code())
        .execute(&mut *conn)
        .await
        .db()?;

    Ok(())
}

async fn fetch_tickets(
    conn: &mut PgConnection,
    booking_ids: &[Uuid],
) -> CoreResult<HashMap<Uuid, Vec<Ticket>>> {
    let rows = sqlx::query_as::<_, TicketRow>(&format!(
        "SELECT {TICKET_COLUMNS} FROM tickets WHERE booking_id = ANY($1) \
         ORDER BY created_at, seat_row, seat_number"
    ))
    .bind(booking_ids)
    .fetch_all(&mut *conn)
    .await
    .db()?;

    let mut by_booking: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
    for row in rows {
        let ticket = Ticket::try_from(row)?;
        by_booking.entry(ticket.booking_id).or_default().push(ticket);
    }
    Ok(by_booking)
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn reserve(
        &self,
        draft: &BookingDraft,
        details: &ShowtimeDetails,
        labels: &HashMap<Uuid, SeatLabel>,
    ) -> CoreResult<Booking> {
        let requested = draft.seat_ids.len();
        let mut tx = self.pool.begin().await.db()?;

        // Candidates are locked in seat id order so overlapping claims queue
        // up instead of deadlocking. The status predicate is re-checked after
        // the lock is granted, so a seat taken meanwhile drops out.
        let claimed = sqlx::query_as::<_, ClaimedSeat>(
            r#"
            WITH candidates AS (
                SELECT seat_id FROM showtime_seats
                WHERE showtime_id = $1 AND seat_id = ANY($2) AND status = $3
                ORDER BY seat_id
                FOR UPDATE
            )
            UPDATE showtime_seats s
            SET status = $4, booking_id = $5
            FROM candidates c
            WHERE s.showtime_id = $1 AND s.seat_id = c.seat_id AND s.status = $3
            RETURNING s.seat_id, s.price
            "#,
        )
        .bind(draft.showtime_id)
        .bind(draft.seat_ids.as_slice())
        .bind(SeatStatus::Available.code())
        .bind(SeatStatus::Locked.code())
        .bind(draft.id)
        .fetch_all(&mut *tx)
        .await
        .db()?;

        if claimed.len() < requested {
            tx.rollback().await.db()?;
            return Err(CoreError::SeatsUnavailable { requested, claimed: claimed.len() });
        }

        let prices: HashMap<Uuid, i64> = claimed.into_iter().map(|c| (c.seat_id, c.price)).collect();
        let mut tickets = Vec::with_capacity(requested);
        for seat_id in &draft.seat_ids {
            let label = labels
                .get(seat_id)
                .ok_or_else(|| CoreError::Validation(format!("unknown seat {seat_id}")))?;
            let price = prices.get(seat_id).copied().unwrap_or_default();
            tickets.push(Ticket::pending(draft, details, label, price));
        }
        let booking = draft.clone().into_booking(tickets)?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, showtime_id, seat_ids, total_price, status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.user_id)
        .bind(booking.showtime_id)
        .bind(booking.seat_ids.as_slice())
        .bind(booking.total_price)
        .bind(booking.status.code())
        .bind(booking.created_at)
        .bind(booking.expires_at)
        .execute(&mut *tx)
        .await
        .db()?;

        for ticket in &booking.tickets {
            sqlx::query(
                r#"
                INSERT INTO tickets (id, booking_id, showtime_id, seat_id, movie_title, cinema_name,
                    screen_name, starts_at, seat_row, seat_number, redemption_code, price, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(ticket.id)
            .bind(ticket.booking_id)
            .bind(ticket.showtime_id)
            .bind(ticket.seat_id)
            .bind(&ticket.movie_title)
            .bind(&ticket.cinema_name)
            .bind(&ticket.screen_name)
            .bind(ticket.starts_at)
            .bind(&ticket.seat_row)
            .bind(ticket.seat_number)
            .bind(ticket.redemption_code.as_deref())
            .bind(ticket.price)
            .bind(ticket.status.code())
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await
            .db()?;
        }

        tx.commit().await.db()?;
        Ok(booking)
    }

    async fn settle(&self, booking_id: Uuid, outcome: PaymentOutcome) -> CoreResult<Settlement> {
        let mut tx = self.pool.begin().await.db()?;

        // Serializes concurrent and duplicate callbacks for the same booking
        let code = sqlx::query_scalar::<_, i16>("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .db()?
            .ok_or(CoreError::BookingNotFound(booking_id))?;
        let current = BookingStatus::try_from(code)?;
        if !current.is_pending() {
            tx.rollback().await.db()?;
            return Ok(Settlement::AlreadySettled { status: current });
        }

        let status = outcome.target_status();
        sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(booking_id)
            .bind(status.code())
            .execute(&mut *tx)
            .await
            .db()?;

        match outcome {
            PaymentOutcome::Success => {
                sqlx::query(
                    "UPDATE showtime_seats SET status = $2 WHERE booking_id = $1 AND status = $3",
                )
                .bind(booking_id)
                .bind(SeatStatus::Sold.code())
                .bind(SeatStatus::Locked.code())
                .execute(&mut *tx)
                .await
                .db()?;

                let ticket_ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM tickets WHERE booking_id = $1")
                    .bind(booking_id)
                    .fetch_all(&mut *tx)
                    .await
                    .db()?;
                for ticket_id in ticket_ids {
                    sqlx::query("UPDATE tickets SET status = $2, redemption_code = $3 WHERE id = $1")
                        .bind(ticket_id)
                        .bind(TicketStatus::Active.code())
                        .bind(issue_code(ticket_id))
                        .execute(&mut *tx)
                        .await
                        .db()?;
                }
            }
            PaymentOutcome::Failed => {
                release_bookings(&mut *tx, &[booking_id]).await?;
            }
        }

        tx.commit().await.db()?;
        Ok(Settlement::Applied { status })
    }

    async fn redeem(&self, code: &str, at: DateTime<Utc>) -> CoreResult<Ticket> {
        let mut tx = self.pool.begin().await.db()?;

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE redemption_code = $1 FOR UPDATE"
        ))
        .bind(code)
        .fetch_optional(&mut *tx)
        .await
        .db()?
        .ok_or_else(|| CoreError::TicketNotFound(code.to_string()))?;

        let mut ticket = Ticket::try_from(row)?;
        if ticket.status != TicketStatus::Active {
            tx.rollback().await.db()?;
            return Err(CoreError::TicketNotActive { status: ticket.status });
        }

        sqlx::query("UPDATE tickets SET status = $2, redeemed_at = $3 WHERE id = $1")
            .bind(ticket.id)
            .bind(TicketStatus::Used.code())
            .bind(at)
            .execute(&mut *tx)
            .await
            .db()?;
        tx.commit().await.db()?;

        ticket.status = TicketStatus::Used;
        ticket.redeemed_at = Some(at);
        Ok(ticket)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let mut conn = self.pool.acquire().await.db()?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .db()?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut tickets = fetch_tickets(&mut *conn, &[id]).await?;
        let booking = row.into_booking(tickets.remove(&id).unwrap_or_default())?;
        Ok(Some(booking))
    }

    async fn list_bookings(&self, user_id: Option<&str>) -> CoreResult<Vec<Booking>> {
        let mut conn = self.pool.acquire().await.db()?;

        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ($1::text IS NULL OR user_id = $1) ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .db()?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tickets = fetch_tickets(&mut *conn, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let own = tickets.remove(&row.id).unwrap_or_default();
                row.into_booking(own)
            })
            .collect()
    }

    async fn expire_pending(&self, cutoff: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await.db()?;

        // Rows held by an in-flight settlement are skipped, not waited on
        let expired = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE bookings SET status = $1
            WHERE id IN (
                SELECT id FROM bookings
                WHERE status = $2 AND expires_at <= $3
                ORDER BY expires_at
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id
            "#,
        )
        .bind(BookingStatus::Cancelled.code())
        .bind(BookingStatus::Pending.code())
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await
        .db()?;

        if !expired.is_empty() {
            release_bookings(&mut *tx, &expired).await?;
        }
        tx.commit().await.db()?;

        debug!(count = expired.len(), cutoff = %cutoff, "Expiry batch committed");
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_row(status: i16) -> TicketRow {
        let now = Utc::now();
        TicketRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            showtime_id: Uuid::new_v4(),
            seat_id: Uuid::new_v4(),
            movie_title: "Arrival".to_string(),
            cinema_name: "Downtown".to_string(),
            screen_name: "Screen 1".to_string(),
            starts_at: now,
            seat_row: "A".to_string(),
            seat_number: 7,
            redemption_code: None,
            price: 100,
            status,
            created_at: now,
            redeemed_at: None,
        }
    }

    #[test]
    fn test_ticket_row_conversion() {
        let ticket = Ticket::try_from(ticket_row(1)).unwrap();
        assert_eq!(ticket.status, TicketStatus::Used);
        assert_eq!(ticket.seat_number, 7);

        let err = Ticket::try_from(ticket_row(9)).unwrap_err();
        assert!(matches!(err, CoreError::UnknownStatus { entity: "ticket", code: 9 }));
    }

    #[test]
    fn test_booking_row_conversion() {
        let now = Utc::now();
        let row = BookingRow {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            showtime_id: Uuid::new_v4(),
            seat_ids: vec![Uuid::new_v4()],
            total_price: 150,
            status: 2,
            created_at: now,
            expires_at: now,
        };
        let booking = row.into_booking(Vec::new()).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.total_price, 150);
    }
}
