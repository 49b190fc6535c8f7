//! Conversions between absolute dollar totals and cost-per-thousand (CPM)
//! rates. Every monetary field in the system is stored both ways, so all
//! other pricing code funnels through these two functions to keep the pair
//! consistent.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::engine::AllocationError;

/// Dollars per thousand units carried at 4 decimal places.
pub const CPM_SCALE: u32 = 4;

/// Whole cents.
pub const MONEY_SCALE: u32 = 2;

const THOUSAND: Decimal = dec!(1000);

/// Rounds a dollar amount to whole cents (banker's rounding, matching how
/// the rest of the Decimal arithmetic in this crate rounds).
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp(MONEY_SCALE)
}

/// Rounds a CPM rate to its storage precision.
pub fn round_cpm(rate: Decimal) -> Decimal {
    rate.round_dp(CPM_SCALE)
}

/// Converts a job total into a per-thousand rate.
pub fn to_cpm(total: Decimal, quantity: i64) -> Result<Decimal, AllocationError> {
    if quantity <= 0 {
        return Err(AllocationError::InvalidQuantity(quantity));
    }
    Ok(total * THOUSAND / Decimal::from(quantity))
}

/// Converts a per-thousand rate back into a job total, rounded to cents.
pub fn to_total(rate: Decimal, quantity: i64) -> Result<Decimal, AllocationError> {
    if quantity <= 0 {
        return Err(AllocationError::InvalidQuantity(quantity));
    }
    Ok(round_cents(rate * Decimal::from(quantity) / THOUSAND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn round_trip_is_exact_for_whole_cents_on_even_thousands() {
        let total = dec!(1603.65);
        let cpm = to_cpm(total, 15_000).unwrap();
        assert_eq!(cpm, dec!(106.91));
        assert_eq!(to_total(cpm, 15_000).unwrap(), total);
    }

    #[test]
    fn round_trip_stays_within_a_cent_for_odd_quantities() {
        let total = dec!(123.45);
        let quantity = 7_331;
        let back = to_total(to_cpm(total, quantity).unwrap(), quantity).unwrap();
        assert!((back - total).abs() <= dec!(0.01), "drifted to {back}");
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert_matches!(to_cpm(dec!(10), 0), Err(AllocationError::InvalidQuantity(0)));
        assert_matches!(to_total(dec!(10), 0), Err(AllocationError::InvalidQuantity(0)));
    }

    #[test]
    fn negative_quantity_is_rejected() {
        assert_matches!(
            to_cpm(dec!(10), -500),
            Err(AllocationError::InvalidQuantity(-500))
        );
    }

    #[test]
    fn round_cents_halves_to_even() {
        assert_eq!(round_cents(dec!(1.005)), dec!(1.00));
        assert_eq!(round_cents(dec!(1.015)), dec!(1.02));
    }
}
