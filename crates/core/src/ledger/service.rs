//! Ledger service: turns ledger operations into [`LedgerChange`]s.
//!
//! Pure business logic with no storage dependencies. The engine reads the
//! student, asks this service for a change, and hands it to the store.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use carrel_shared::types::PaymentId;

use super::money::money;
use super::types::{BalanceChange, LedgerChange, NewPayment, Payment};
use crate::error::{EngineError, EngineResult};
use crate::library::types::optional;
use crate::plan::PaymentPlan;
use crate::student::Student;

/// Ledger service for balance changes.
pub struct LedgerService;

impl LedgerService {
    /// Plans recording a payment for `student`.
    ///
    /// The balance decreases by the amount and is never clamped: paying more
    /// than is owed leaves a credit. The payment date defaults to `today`.
    ///
    /// # Errors
    ///
    /// Returns a validation error on `amount` unless it is greater than zero
    /// and fits the money range.
    pub fn payment(
        student: &Student,
        input: NewPayment,
        today: NaiveDate,
    ) -> EngineResult<LedgerChange> {
        if input.amount <= Decimal::ZERO {
            return Err(EngineError::validation(
                "amount",
                "must be greater than zero",
            ));
        }
        money("amount", input.amount)?;

        let payment_date = input.payment_date.unwrap_or(today);
        let payment = Payment {
            id: PaymentId::new(),
            library_id: student.library_id,
            student_id: student.id,
            amount: input.amount,
            payment_date,
            notes: optional(input.notes.as_deref()),
            recorded_at: Utc::now(),
        };

        Ok(LedgerChange {
            library_id: student.library_id,
            student_id: student.id,
            balance: BalanceChange::Decrease(input.amount),
            last_payment_date: Some(payment_date),
            settle_reactivates: true,
            payment: Some(payment),
        })
    }

    /// Plans zeroing the balance.
    ///
    /// Discards any credit as well as any debt. No journal row is written, so
    /// cleared dues do not count as income.
    #[must_use]
    pub fn clear_dues(student: &Student, today: NaiveDate) -> LedgerChange {
        LedgerChange {
            library_id: student.library_id,
            student_id: student.id,
            balance: BalanceChange::Set(Decimal::ZERO),
            last_payment_date: Some(today),
            settle_reactivates: true,
            payment: None,
        }
    }

    /// Plans charging one cycle of `plan` to `student`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the plan belongs to another library.
    pub fn plan_charge(student: &Student, plan: &PaymentPlan) -> EngineResult<LedgerChange> {
        if plan.library_id != student.library_id {
            return Err(EngineError::validation(
                "payment_plan_id",
                "plan belongs to a different library",
            ));
        }

        Ok(LedgerChange {
            library_id: student.library_id,
            student_id: student.id,
            balance: BalanceChange::Increase(plan.amount),
            last_payment_date: None,
            settle_reactivates: false,
            payment: None,
        })
    }

    /// Plans a manual balance override from a student edit.
    ///
    /// # Errors
    ///
    /// Returns a validation error on `fees_due` if it does not fit the money
    /// range.
    pub fn manual_balance(student: &Student, fees_due: Decimal) -> EngineResult<LedgerChange> {
        Ok(LedgerChange {
            library_id: student.library_id,
            student_id: student.id,
            balance: BalanceChange::Set(money("fees_due", fees_due)?),
            last_payment_date: None,
            settle_reactivates: false,
            payment: None,
        })
    }
}
