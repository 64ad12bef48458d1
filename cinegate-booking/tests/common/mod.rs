#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use cinegate_booking::{
    ExpiryPolicy, ExpirySweeper, MemoryStore, ProvisioningService, RecordingNotifier,
    RedemptionEngine, ReservationEngine, ReservationPolicy, SettlementEngine,
};
use cinegate_core::repository::CatalogLookup;
use cinegate_core::{Clock, ManualClock, ReservationRequest, Seat, SeatType, Showtime};

pub const HOLD_MINUTES: i64 = 15;

/// Engines wired to one in-memory store, with a showtime already on sale.
///
/// Auditorium layout: A-01, A-02, A-03 (Normal), B-01 (Vip), C-01 (Couple).
/// Base price 100.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub reservations: ReservationEngine,
    pub settlement: SettlementEngine,
    pub redemption: RedemptionEngine,
    pub provisioning: ProvisioningService,
    pub sweeper: ExpirySweeper,
    pub movie_id: Uuid,
    pub cinema_id: Uuid,
    pub auditorium_id: Uuid,
    pub showtime_id: Uuid,
    pub seats: Vec<Seat>,
}

impl Harness {
    pub async fn new() -> Arc<Self> {
        Self::with_notifier(RecordingNotifier::new()).await
    }

    pub async fn with_notifier(notifier: RecordingNotifier) -> Arc<Self> {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let notifier = Arc::new(notifier);

        let movie_id = store.add_movie("Arrival").await;
        let cinema_id = store.add_cinema("Downtown").await;
        let auditorium_id = store
            .add_auditorium(
                "Screen 1",
                &[
                    ("A", 1, SeatType::Normal),
                    ("A", 2, SeatType::Normal),
                    ("A", 3, SeatType::Normal),
                    ("B", 1, SeatType::Vip),
                    ("C", 1, SeatType::Couple),
                ],
            )
            .await;
        let seats = store.auditorium_seats(auditorium_id).await.unwrap();

        let policy = ReservationPolicy::new(Duration::minutes(HOLD_MINUTES), 4);
        let expiry = ExpiryPolicy {
            sweep_interval: std::time::Duration::from_millis(10),
            batch_size: 2,
            grace: Duration::seconds(5),
        };

        let harness = Self {
            reservations: ReservationEngine::new(
                store.clone(),
                store.clone(),
                clock.clone(),
                policy,
            ),
            settlement: SettlementEngine::new(store.clone(), notifier.clone()),
            redemption: RedemptionEngine::new(store.clone(), clock.clone()),
            provisioning: ProvisioningService::new(store.clone(), store.clone()),
            sweeper: ExpirySweeper::new(store.clone(), clock.clone(), expiry),
            store,
            clock,
            notifier,
            movie_id,
            cinema_id,
            auditorium_id,
            showtime_id: Uuid::new_v4(),
            seats,
        };

        let showtime = harness.showtime(harness.showtime_id, 100);
        harness.provisioning.provision(vec![showtime]).await.unwrap();
        Arc::new(harness)
    }

    pub fn showtime(&self, id: Uuid, base_price: i64) -> Showtime {
        let starts_at = self.clock.now() + Duration::days(1);
        Showtime {
            id,
            movie_id: self.movie_id,
            cinema_id: self.cinema_id,
            auditorium_id: self.auditorium_id,
            starts_at,
            ends_at: starts_at + Duration::minutes(120),
            base_price,
        }
    }

    /// Seat id by label, e.g. `seat("A-02")`
    pub fn seat(&self, label: &str) -> Uuid {
        self.seats
            .iter()
            .find(|s| s.label() == label)
            .map(|s| s.id)
            .unwrap_or_else(|| panic!("no seat {label}"))
    }

    pub fn request(&self, user: &str, labels: &[&str]) -> ReservationRequest {
        ReservationRequest {
            user_id: user.to_string(),
            showtime_id: self.showtime_id,
            seat_ids: labels.iter().map(|l| self.seat(l)).collect(),
        }
    }
}
