use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use cinegate_core::repository::{BookingRepository, Notifier};
use cinegate_core::{BookingStatus, CoreResult, PaymentOutcome, Settlement};
use cinegate_shared::PaymentNotification;

/// Applies payment outcomes to bookings exactly once.
///
/// Duplicate and late callbacks come back as `Settlement::AlreadySettled`
/// and are acknowledged like any other success.
pub struct SettlementEngine {
    bookings: Arc<dyn BookingRepository>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementEngine {
    pub fn new(bookings: Arc<dyn BookingRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { bookings, notifier }
    }

    /// Entry point for the payment webhook / topic
    pub async fn handle_notification(
        &self,
        notification: &PaymentNotification,
    ) -> CoreResult<Settlement> {
        let outcome = notification.payment_status.parse::<PaymentOutcome>()?;
        info!(
            booking_id = %notification.booking_id,
            transaction_id = %notification.transaction_id,
            status = %notification.payment_status,
            "Payment notification received"
        );
        self.settle(notification.booking_id, outcome).await
    }

    pub async fn settle(&self, booking_id: Uuid, outcome: PaymentOutcome) -> CoreResult<Settlement> {
        let settlement = self.bookings.settle(booking_id, outcome).await?;

        match settlement {
            Settlement::Applied { status: BookingStatus::Confirmed } => {
                info!(booking_id = %booking_id, "Booking confirmed, tickets issued");
                self.dispatch_confirmation(booking_id).await;
            }
            Settlement::Applied { status } => {
                info!(booking_id = %booking_id, status = %status, "Booking settled, seats released");
            }
            Settlement::AlreadySettled { status: BookingStatus::Cancelled }
                if outcome == PaymentOutcome::Success =>
            {
                warn!(
                    booking_id = %booking_id,
                    "Payment succeeded for a booking that already expired; refund required"
                );
            }
            Settlement::AlreadySettled { status } => {
                info!(booking_id = %booking_id, status = %status, "Duplicate payment notification ignored");
            }
        }

        Ok(settlement)
    }

    // The confirmation is committed at this point. Nothing here may fail the call.
    async fn dispatch_confirmation(&self, booking_id: Uuid) {
        let booking = match self.bookings.get_booking(booking_id).await {
            Ok(Some(booking)) => booking,
            Ok(None) => {
                error!(booking_id = %booking_id, "Confirmed booking vanished before notification");
                return;
            }
            Err(e) => {
                error!(booking_id = %booking_id, "Failed to load confirmed booking: {}", e);
                return;
            }
        };

        if let Err(e) = self.notifier.booking_confirmed(&booking).await {
            error!(booking_id = %booking_id, "Failed to dispatch confirmation: {}", e);
        }
    }
}
