use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use cinegate_core::repository::{CatalogLookup, InventoryRepository};
use cinegate_core::{
    CoreError, CoreResult, ProvisioningFailure, SeatStatus, SeatView, Showtime, ShowtimeSeat,
};

/// Opens showtimes for sale and serves the seat map.
pub struct ProvisioningService {
    inventory: Arc<dyn InventoryRepository>,
    catalog: Arc<dyn CatalogLookup>,
}

impl ProvisioningService {
    pub fn new(inventory: Arc<dyn InventoryRepository>, catalog: Arc<dyn CatalogLookup>) -> Self {
        Self { inventory, catalog }
    }

    /// Persist each showtime with its priced seat inventory.
    ///
    /// Showtimes are expanded concurrently, each in its own transaction. A
    /// showtime is either fully provisioned or absent. If any fails the
    /// result is `ProvisioningIncomplete` listing both sides.
    pub async fn provision(&self, showtimes: Vec<Showtime>) -> CoreResult<Vec<Uuid>> {
        if showtimes.is_empty() {
            return Err(CoreError::Validation("no showtimes to provision".into()));
        }

        let results = join_all(showtimes.iter().map(|s| self.provision_one(s))).await;

        let mut provisioned = Vec::new();
        let mut failed = Vec::new();
        for (showtime, result) in showtimes.iter().zip(results) {
            match result {
                Ok(seats) => {
                    info!(showtime_id = %showtime.id, seats, "Showtime provisioned");
                    provisioned.push(showtime.id);
                }
                Err(e) => {
                    error!(showtime_id = %showtime.id, "Provisioning failed: {}", e);
                    failed.push(ProvisioningFailure {
                        showtime_id: showtime.id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if failed.is_empty() {
            Ok(provisioned)
        } else {
            Err(CoreError::ProvisioningIncomplete { provisioned, failed })
        }
    }

    async fn provision_one(&self, showtime: &Showtime) -> CoreResult<usize> {
        showtime.validate()?;

        let catalog = self.catalog.auditorium_seats(showtime.auditorium_id).await?;
        if catalog.is_empty() {
            return Err(CoreError::Validation(format!(
                "auditorium {} has no seats",
                showtime.auditorium_id
            )));
        }

        let seats = catalog
            .iter()
            .map(|seat| {
                Ok(ShowtimeSeat {
                    seat_id: seat.id,
                    showtime_id: showtime.id,
                    status: SeatStatus::Available,
                    price: seat.seat_type.price_for(showtime.base_price)?,
                    booking_id: None,
                })
            })
            .collect::<CoreResult<Vec<ShowtimeSeat>>>()?;

        self.inventory.provision(showtime, &seats).await?;
        Ok(seats.len())
    }

    pub async fn list_showtimes(&self) -> CoreResult<Vec<Showtime>> {
        self.inventory.list_showtimes().await
    }

    pub async fn list_showtime_seats(&self, showtime_id: Uuid) -> CoreResult<Vec<ShowtimeSeat>> {
        self.inventory.list_showtime_seats(showtime_id).await
    }

    /// Seat map for display, ordered by row then seat number
    pub async fn seat_map(&self, showtime_id: Uuid) -> CoreResult<Vec<SeatView>> {
        let showtime = self
            .inventory
            .get_showtime(showtime_id)
            .await?
            .ok_or(CoreError::ShowtimeNotFound(showtime_id))?;

        let catalog: HashMap<Uuid, _> = self
            .catalog
            .auditorium_seats(showtime.auditorium_id)
            .await?
            .into_iter()
            .map(|seat| (seat.id, seat))
            .collect();

        let mut views: Vec<SeatView> = self
            .inventory
            .list_showtime_seats(showtime_id)
            .await?
            .iter()
            .filter_map(|inv| catalog.get(&inv.seat_id).map(|seat| SeatView::new(inv, seat)))
            .collect();
        views.sort_by(|a, b| a.row.cmp(&b.row).then(a.number.cmp(&b.number)));
        Ok(views)
    }
}
