//! Bounds on money values.
//!
//! Amounts and balances are persisted as `NUMERIC(12, 2)`: at most two
//! decimal places and ten integer digits. Every amount entering the engine
//! and every balance it computes stays inside that range.

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};

/// Decimal places a money value may carry.
pub const MONEY_SCALE: u32 = 2;

/// Largest magnitude of an amount or a balance: `9999999999.99`.
#[must_use]
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, MONEY_SCALE)
}

/// Returns true if `value` fits a stored money column.
#[must_use]
pub fn fits(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_SCALE && value.abs() <= max_money()
}

/// Checks an incoming money value for `field`.
///
/// # Errors
///
/// Returns a validation error for more than two decimal places or a
/// magnitude above [`max_money`].
pub fn money(field: &'static str, value: Decimal) -> EngineResult<Decimal> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(EngineError::validation(
            field,
            "at most 2 decimal places are allowed",
        ));
    }
    if value.abs() > max_money() {
        return Err(EngineError::validation(
            field,
            format!("must not exceed {} in magnitude", max_money()),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(1050))]
    #[case(dec!(-50.5))]
    #[case(dec!(12.30))]
    #[case(dec!(12.300))]
    #[case(dec!(9999999999.99))]
    #[case(dec!(-9999999999.99))]
    fn test_accepts_storable_values(#[case] value: Decimal) {
        assert_eq!(money("amount", value).unwrap(), value);
        assert!(fits(value));
    }

    #[rstest]
    #[case(dec!(0.004))]
    #[case(dec!(10.125))]
    #[case(dec!(10000000000))]
    #[case(dec!(-10000000000))]
    #[case(Decimal::MAX)]
    #[case(Decimal::MIN)]
    fn test_rejects_unstorable_values(#[case] value: Decimal) {
        assert!(matches!(
            money("amount", value),
            Err(EngineError::Validation { field: "amount", .. })
        ));
        assert!(!fits(value));
    }
}
