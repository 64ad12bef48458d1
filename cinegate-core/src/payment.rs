use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{BookingStatus, CoreError};

/// Terminal payment result reported by the payment provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Success,
    Failed,
}

impl PaymentOutcome {
    /// Booking status this outcome settles into
    pub fn target_status(self) -> BookingStatus {
        match self {
            PaymentOutcome::Success => BookingStatus::Confirmed,
            PaymentOutcome::Failed => BookingStatus::Failed,
        }
    }
}

impl FromStr for PaymentOutcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SUCCESS" => Ok(PaymentOutcome::Success),
            "FAILED" => Ok(PaymentOutcome::Failed),
            other => Err(CoreError::Validation(format!(
                "unsupported payment status '{other}'"
            ))),
        }
    }
}

/// Result of applying a payment outcome to a booking.
///
/// Both variants are successes: a duplicate or late callback reports the
/// status the booking already holds and mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Applied { status: BookingStatus },
    AlreadySettled { status: BookingStatus },
}

impl Settlement {
    pub fn status(&self) -> BookingStatus {
        match self {
            Settlement::Applied { status } | Settlement::AlreadySettled { status } => *status,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Settlement::Applied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_status() {
        assert_eq!("SUCCESS".parse::<PaymentOutcome>().unwrap(), PaymentOutcome::Success);
        assert_eq!("FAILED".parse::<PaymentOutcome>().unwrap(), PaymentOutcome::Failed);

        let err = "PENDING".parse::<PaymentOutcome>().unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!("success".parse::<PaymentOutcome>().is_err());
    }

    #[test]
    fn test_settlement_status() {
        assert_eq!(PaymentOutcome::Success.target_status(), BookingStatus::Confirmed);
        assert_eq!(PaymentOutcome::Failed.target_status(), BookingStatus::Failed);

        let dup = Settlement::AlreadySettled { status: BookingStatus::Cancelled };
        assert!(!dup.was_applied());
        assert_eq!(dup.status(), BookingStatus::Cancelled);
    }
}
