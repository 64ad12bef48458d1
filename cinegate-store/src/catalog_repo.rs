use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use cinegate_core::repository::CatalogLookup;
use cinegate_core::{CoreResult, Seat, SeatLabel, SeatType, ShowtimeDetails};

use crate::error::DbResultExt;

/// Movies, venues and seat layouts. Read-only from this service.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct DetailsRow {
    showtime_id: Uuid,
    movie_title: String,
    cinema_name: String,
    screen_name: String,
    starts_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    auditorium_id: Uuid,
    seat_row: String,
    seat_number: i32,
    seat_type: i16,
}

#[async_trait]
impl CatalogLookup for PgCatalog {
    async fn showtime_details(&self, showtime_id: Uuid) -> CoreResult<Option<ShowtimeDetails>> {
        let row = sqlx::query_as::<_, DetailsRow>(
            r#"
            SELECT st.id AS showtime_id, m.title AS movie_title, c.name AS cinema_name,
                   a.name AS screen_name, st.starts_at
            FROM showtimes st
            JOIN movies m ON m.id = st.movie_id
            JOIN cinemas c ON c.id = st.cinema_id
            JOIN auditoriums a ON a.id = st.auditorium_id
            WHERE st.id = $1
            "#,
        )
        .bind(showtime_id)
        .fetch_optional(&self.pool)
        .await
        .db()?;

        Ok(row.map(|r| ShowtimeDetails {
            showtime_id: r.showtime_id,
            movie_title: r.movie_title,
            cinema_name: r.cinema_name,
            screen_name: r.screen_name,
            starts_at: r.starts_at,
        }))
    }

    async fn seat_labels(&self, seat_ids: &[Uuid]) -> CoreResult<HashMap<Uuid, SeatLabel>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, auditorium_id, seat_row, seat_number, seat_type FROM seats WHERE id = ANY($1)",
        )
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await
        .db()?;

        Ok(rows
            .into_iter()
            .map(|r| (r.id, SeatLabel { seat_id: r.id, row: r.seat_row, number: r.seat_number }))
            .collect())
    }

    async fn auditorium_seats(&self, auditorium_id: Uuid) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            r#"
            SELECT id, auditorium_id, seat_row, seat_number, seat_type
            FROM seats
            WHERE auditorium_id = $1
            ORDER BY seat_row, seat_number
            "#,
        )
        .bind(auditorium_id)
        .fetch_all(&self.pool)
        .await
        .db()?;

        rows.into_iter()
            .map(|r| {
                Ok(Seat {
                    id: r.id,
                    auditorium_id: r.auditorium_id,
                    row: r.seat_row,
                    number: r.seat_number,
                    seat_type: SeatType::try_from(r.seat_type)?,
                })
            })
            .collect()
    }
}
