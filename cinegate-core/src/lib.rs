pub mod clock;
pub mod models;
pub mod payment;
pub mod pricing;
pub mod redemption;
pub mod repository;

use uuid::Uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use models::{
    Booking, BookingDraft, BookingStatus, ReservationRequest, Seat, SeatLabel, SeatStatus,
    SeatType, SeatView, Showtime, ShowtimeDetails, ShowtimeSeat, Ticket, TicketStatus,
};
pub use payment::{PaymentOutcome, Settlement};

/// Coarse classification used by callers to pick a response or a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Contention,
    NotFound,
    Conflict,
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Showtime not found: {0}")]
    ShowtimeNotFound(Uuid),
    #[error("Seats unavailable: requested {requested}, claimed {claimed}")]
    SeatsUnavailable { requested: usize, claimed: usize },
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),
    #[error("Ticket not found for code {0}")]
    TicketNotFound(String),
    #[error("Ticket invalid or already used (status {status})")]
    TicketNotActive { status: TicketStatus },
    #[error("Provisioning incomplete: {} provisioned, {} failed", .provisioned.len(), .failed.len())]
    ProvisioningIncomplete {
        provisioned: Vec<Uuid>,
        failed: Vec<ProvisioningFailure>,
    },
    #[error("Unknown {entity} status code {code}")]
    UnknownStatus { entity: &'static str, code: i16 },
    #[error("Persistence failure: {0}")]
    Persistence(Box<dyn std::error::Error + Send + Sync>),
}

/// One showtime whose inventory could not be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningFailure {
    pub showtime_id: Uuid,
    pub reason: String,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::SeatsUnavailable { .. } => ErrorKind::Contention,
            CoreError::ShowtimeNotFound(_)
            | CoreError::BookingNotFound(_)
            | CoreError::TicketNotFound(_) => ErrorKind::NotFound,
            CoreError::TicketNotActive { .. } => ErrorKind::Conflict,
            CoreError::ProvisioningIncomplete { .. }
            | CoreError::UnknownStatus { .. }
            | CoreError::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Only storage/transport failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Persistence(_))
    }

    pub fn persistence<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        CoreError::Persistence(err.into())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(CoreError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            CoreError::SeatsUnavailable { requested: 2, claimed: 1 }.kind(),
            ErrorKind::Contention
        );
        assert_eq!(CoreError::TicketNotFound("c".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            CoreError::TicketNotActive { status: TicketStatus::Used }.kind(),
            ErrorKind::Conflict
        );

        assert!(CoreError::persistence("connection reset").is_retryable());
        assert!(!CoreError::BookingNotFound(Uuid::new_v4()).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = CoreError::SeatsUnavailable { requested: 3, claimed: 1 };
        assert_eq!(err.to_string(), "Seats unavailable: requested 3, claimed 1");

        let err = CoreError::TicketNotActive { status: TicketStatus::Used };
        assert_eq!(err.to_string(), "Ticket invalid or already used (status USED)");
    }
}
