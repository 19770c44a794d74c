//! Property-based tests for LedgerService.
//!
//! - Payments move the balance by exactly the amount, with no clamping
//! - Clearing dues always lands on zero
//! - The journal sum matches the balance movement when only payments occur
//! - Payments at the money range limits are rejected instead of overflowing

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use carrel_shared::types::LibraryId;

use super::money::{self, max_money};
use super::service::LedgerService;
use super::types::NewPayment;
use crate::student::{NewStudent, Student};

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate signed balances (-10,000.00 to 10,000.00).
fn balance() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for storable balances, weighted towards the range limits.
fn edge_balance() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(max_money()),
        Just(-max_money()),
        (-999_999_999_999i64..=999_999_999_999i64).prop_map(|cents| Decimal::new(cents, 2)),
    ]
}

/// Strategy for raw payment amounts, unstorable ones included.
fn edge_amount() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        Just(Decimal::MAX),
        Just(max_money()),
        Just(Decimal::new(4, 3)),
        (1i64..=999_999_999_999i64).prop_map(|cents| Decimal::new(cents, 2)),
    ]
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, 20).unwrap()
}

fn student(fees_due: Decimal) -> Student {
    NewStudent {
        full_name: "Prop".into(),
        fees_due: Some(fees_due),
        ..Default::default()
    }
    .into_student(LibraryId::new(), None, today())
    .unwrap()
}

proptest! {
    #[test]
    fn prop_payment_is_exact_subtraction(opening in balance(), amount in positive_amount()) {
        let mut s = student(opening);
        let change = LedgerService::payment(
            &s,
            NewPayment { amount, payment_date: None, notes: None },
            today(),
        ).unwrap();
        change.apply_to(&mut s).unwrap();

        prop_assert_eq!(s.fees_due, opening - amount);
    }

    #[test]
    fn prop_clear_dues_always_zero(opening in balance()) {
        let mut s = student(opening);
        LedgerService::clear_dues(&s, today()).apply_to(&mut s).unwrap();
        prop_assert_eq!(s.fees_due, Decimal::ZERO);
    }

    #[test]
    fn prop_journal_matches_balance_movement(
        opening in balance(),
        amounts in prop::collection::vec(positive_amount(), 1..20),
    ) {
        let mut s = student(opening);
        let mut journal = Decimal::ZERO;

        for amount in amounts {
            let change = LedgerService::payment(
                &s,
                NewPayment { amount, payment_date: None, notes: None },
                today(),
            ).unwrap();
            journal += change.payment.as_ref().map_or(Decimal::ZERO, |p| p.amount);
            change.apply_to(&mut s).unwrap();
        }

        prop_assert_eq!(opening - s.fees_due, journal);
    }

    #[test]
    fn prop_payment_near_bounds_never_panics(
        opening in edge_balance(),
        amount in edge_amount(),
    ) {
        let mut s = student(opening);
        let before = s.clone();
        let planned = LedgerService::payment(
            &s,
            NewPayment { amount, payment_date: None, notes: None },
            today(),
        );

        if let Ok(change) = planned {
            match change.apply_to(&mut s) {
                Ok(()) => prop_assert!(money::fits(s.fees_due)),
                Err(_) => prop_assert_eq!(&s, &before),
            }
        }
    }

    #[test]
    fn prop_settled_payment_reactivates(opening in balance(), extra in positive_amount()) {
        let mut s = student(opening);
        s.deactivated = true;
        let amount = opening.max(Decimal::ZERO) + extra;
        LedgerService::payment(
            &s,
            NewPayment { amount, payment_date: None, notes: None },
            today(),
        ).unwrap().apply_to(&mut s).unwrap();

        prop_assert!(s.fees_due <= Decimal::ZERO);
        prop_assert!(!s.deactivated);
    }
}
