use std::sync::Arc;

use cinegate_booking::{
    ExpiryPolicy, ExpirySweeper, ProvisioningService, RedemptionEngine, ReservationEngine,
    ReservationPolicy, SettlementEngine,
};
use cinegate_core::repository::{BookingRepository, CatalogLookup, InventoryRepository, Notifier};
use cinegate_core::Clock;
use cinegate_store::app_config::BusinessRules;

use crate::handlers::{MessageHandler, Topics};

pub fn reservation_policy(rules: &BusinessRules) -> ReservationPolicy {
    ReservationPolicy::new(rules.booking_hold(), rules.max_seats_per_booking)
}

pub fn expiry_policy(rules: &BusinessRules) -> ExpiryPolicy {
    ExpiryPolicy {
        sweep_interval: rules.sweep_interval(),
        batch_size: rules.expiry_batch_size,
        grace: rules.expiry_grace(),
    }
}

/// Storage and collaborators the engines are built from
pub struct Backends {
    pub bookings: Arc<dyn BookingRepository>,
    pub inventory: Arc<dyn InventoryRepository>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// Every engine, wired once at startup
pub struct App {
    pub reservations: Arc<ReservationEngine>,
    pub settlement: Arc<SettlementEngine>,
    pub redemption: Arc<RedemptionEngine>,
    pub provisioning: Arc<ProvisioningService>,
    pub sweeper: Arc<ExpirySweeper>,
}

impl App {
    pub fn new(backends: Backends, rules: &BusinessRules) -> Self {
        let Backends { bookings, inventory, catalog, notifier, clock } = backends;

        Self {
            reservations: Arc::new(ReservationEngine::new(
                bookings.clone(),
                catalog.clone(),
                clock.clone(),
                reservation_policy(rules),
            )),
            settlement: Arc::new(SettlementEngine::new(bookings.clone(), notifier)),
            redemption: Arc::new(RedemptionEngine::new(bookings.clone(), clock.clone())),
            provisioning: Arc::new(ProvisioningService::new(inventory, catalog)),
            sweeper: Arc::new(ExpirySweeper::new(bookings, clock, expiry_policy(rules))),
        }
    }

    pub fn message_handler(&self, topics: Topics) -> MessageHandler {
        MessageHandler::new(topics, self.settlement.clone(), self.provisioning.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies_follow_business_rules() {
        let rules = BusinessRules {
            booking_hold_seconds: 600,
            max_seats_per_booking: 6,
            expiry_sweep_interval_seconds: 15,
            expiry_batch_size: 50,
            expiry_grace_seconds: 10,
        };

        let reservation = reservation_policy(&rules);
        assert_eq!(reservation.hold, chrono::Duration::minutes(10));
        assert_eq!(reservation.max_seats, 6);

        let expiry = expiry_policy(&rules);
        assert_eq!(expiry.sweep_interval, std::time::Duration::from_secs(15));
        assert_eq!(expiry.batch_size, 50);
        assert_eq!(expiry.grace, chrono::Duration::seconds(10));
    }
}
