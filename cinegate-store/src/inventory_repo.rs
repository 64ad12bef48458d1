use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cinegate_core::repository::InventoryRepository;
use cinegate_core::{CoreError, CoreResult, SeatStatus, Showtime, ShowtimeSeat};

use crate::error::DbResultExt;

pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ShowtimeRow {
    id: Uuid,
    movie_id: Uuid,
    cinema_id: Uuid,
    auditorium_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    base_price: i64,
}

impl From<ShowtimeRow> for Showtime {
    fn from(row: ShowtimeRow) -> Self {
        Showtime {
            id: row.id,
            movie_id: row.movie_id,
            cinema_id: row.cinema_id,
            auditorium_id: row.auditorium_id,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            base_price: row.base_price,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ShowtimeSeatRow {
    seat_id: Uuid,
    showtime_id: Uuid,
    status: i16,
    price: i64,
    booking_id: Option<Uuid>,
}

impl TryFrom<ShowtimeSeatRow> for ShowtimeSeat {
    type Error = CoreError;

    fn try_from(row: ShowtimeSeatRow) -> Result<Self, Self::Error> {
        Ok(ShowtimeSeat {
            seat_id: row.seat_id,
            showtime_id: row.showtime_id,
            status: SeatStatus::try_from(row.status)?,
            price: row.price,
            booking_id: row.booking_id,
        })
    }
}

const SHOWTIME_COLUMNS: &str =
    "id, movie_id, cinema_id, auditorium_id, starts_at, ends_at, base_price";

#[async_trait]
impl InventoryRepository for PgInventoryRepository {
    async fn provision(&self, showtime: &Showtime, seats: &[ShowtimeSeat]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.db()?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO showtimes (id, movie_id, cinema_id, auditorium_id, starts_at, ends_at, base_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(showtime.id)
        .bind(showtime.movie_id)
        .bind(showtime.cinema_id)
        .bind(showtime.auditorium_id)
        .bind(showtime.starts_at)
        .bind(showtime.ends_at)
        .bind(showtime.base_price)
        .execute(&mut *tx)
        .await
        .db()?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.db()?;
            return Err(CoreError::Validation(format!(
                "showtime {} already provisioned",
                showtime.id
            )));
        }

        let seat_ids: Vec<Uuid> = seats.iter().map(|s| s.seat_id).collect();
        let prices: Vec<i64> = seats.iter().map(|s| s.price).collect();
        sqlx::query(
            r#"
            INSERT INTO showtime_seats (seat_id, showtime_id, status, price)
            SELECT t.seat_id, $3, $4, t.price
            FROM UNNEST($1::uuid[], $2::bigint[]) AS t(seat_id, price)
            "#,
        )
        .bind(&seat_ids)
        .bind(&prices)
        .bind(showtime.id)
        .bind(SeatStatus::Available.code())
        .execute(&mut *tx)
        .await
        .db()?;

        tx.commit().await.db()?;
        Ok(())
    }

    async fn get_showtime(&self, id: Uuid) -> CoreResult<Option<Showtime>> {
        let row = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        Ok(row.map(Showtime::from))
    }

    async fn list_showtimes(&self) -> CoreResult<Vec<Showtime>> {
        let rows = sqlx::query_as::<_, ShowtimeRow>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes ORDER BY starts_at"
        ))
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows.into_iter().map(Showtime::from).collect())
    }

    async fn list_showtime_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<ShowtimeSeat>> {
        let rows = sqlx::query_as::<_, ShowtimeSeatRow>(
            r#"
            SELECT seat_id, showtime_id, status, price, booking_id
            FROM showtime_seats
            WHERE showtime_id = $1
            ORDER BY seat_id
            "#,
        )
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        rows.into_iter().map(ShowtimeSeat::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_row_conversion() {
        let row = ShowtimeSeatRow {
            seat_id: Uuid::new_v4(),
            showtime_id: Uuid::new_v4(),
            status: 1,
            price: 150,
            booking_id: Some(Uuid::new_v4()),
        };
        let seat = ShowtimeSeat::try_from(row).unwrap();
        assert_eq!(seat.status, SeatStatus::Locked);

        let bad = ShowtimeSeatRow {
            seat_id: Uuid::new_v4(),
            showtime_id: Uuid::new_v4(),
            status: 5,
            price: 0,
            booking_id: None,
        };
        assert!(ShowtimeSeat::try_from(bad).is_err());
    }
}
