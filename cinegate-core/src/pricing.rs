use crate::{CoreError, CoreResult, SeatType};

impl SeatType {
    /// Price multiplier in tenths: Normal 1.0, Vip 1.5, Couple 3.5
    pub fn multiplier_tenths(self) -> i64 {
        match self {
            SeatType::Normal => 10,
            SeatType::Vip => 15,
            SeatType::Couple => 35,
        }
    }

    /// Seat price in minor units for a showtime base price, rounded half-up
    pub fn price_for(self, base_price: i64) -> CoreResult<i64> {
        base_price
            .checked_mul(self.multiplier_tenths())
            .and_then(|tenths| tenths.checked_add(5))
            .map(|tenths| tenths / 10)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "base price {base_price} is too large for a {} seat",
                    self.as_str()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipliers() {
        assert_eq!(SeatType::Normal.price_for(100).unwrap(), 100);
        assert_eq!(SeatType::Vip.price_for(100).unwrap(), 150);
        assert_eq!(SeatType::Couple.price_for(100).unwrap(), 350);
    }

    #[test]
    fn test_half_up_rounding() {
        // 1.5 * 75 = 112.5
        assert_eq!(SeatType::Vip.price_for(75).unwrap(), 113);
        // 3.5 * 3 = 10.5
        assert_eq!(SeatType::Couple.price_for(3).unwrap(), 11);
        assert_eq!(SeatType::Vip.price_for(0).unwrap(), 0);
    }

    #[test]
    fn test_oversized_base_price_is_rejected() {
        let err = SeatType::Couple.price_for(i64::MAX / 10).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(SeatType::Normal.price_for(i64::MAX).is_err());
        // Largest base price a Normal seat still accepts
        assert_eq!(SeatType::Normal.price_for((i64::MAX - 5) / 10).unwrap(), (i64::MAX - 5) / 10);
    }
}
