use std::sync::Arc;
use tracing::{info, warn};

use cinegate_core::redemption::parse_code;
use cinegate_core::repository::BookingRepository;
use cinegate_core::{Clock, CoreError, CoreResult, Ticket};

/// Consumes tickets at the venue gate
pub struct RedemptionEngine {
    bookings: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
}

impl RedemptionEngine {
    pub fn new(bookings: Arc<dyn BookingRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { bookings, clock }
    }

    /// Redeem a scanned code. Succeeds at most once per ticket.
    pub async fn redeem(&self, code: &str) -> CoreResult<Ticket> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CoreError::Validation("redemption code must not be empty".into()));
        }
        // Malformed codes cannot match any ticket
        if parse_code(code).is_none() {
            return Err(CoreError::TicketNotFound(code.to_string()));
        }

        match self.bookings.redeem(code, self.clock.now()).await {
            Ok(ticket) => {
                info!(ticket_id = %ticket.id, booking_id = %ticket.booking_id, "Ticket redeemed");
                Ok(ticket)
            }
            Err(e @ CoreError::TicketNotActive { .. }) => {
                warn!("Rejected scan: {}", e);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
