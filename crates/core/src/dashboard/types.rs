//! Dashboard summary computation.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::ledger::Payment;
use crate::seat::Seat;
use crate::student::{Student, StudentStatus};

/// Headline numbers for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    /// Students in scope, deactivated ones included.
    pub total_students: usize,
    /// Seats in scope.
    pub total_seats: usize,
    /// Vacant seats.
    pub available_seats: usize,
    /// Payments dated in the current calendar month.
    pub monthly_income: Decimal,
    /// Students whose derived status is owing.
    pub students_owing: usize,
}

impl DashboardSummary {
    /// Computes the summary from already-scoped records.
    ///
    /// # Errors
    ///
    /// Returns a validation error on `monthly_income` if the month's
    /// payments overflow a decimal.
    pub fn compute(
        students: &[Student],
        seats: &[Seat],
        payments: &[Payment],
        today: NaiveDate,
    ) -> EngineResult<Self> {
        let monthly_income = payments
            .iter()
            .filter(|p| {
                p.payment_date.year() == today.year() && p.payment_date.month() == today.month()
            })
            .try_fold(Decimal::ZERO, |total, p| total.checked_add(p.amount))
            .ok_or_else(|| {
                EngineError::validation("monthly_income", "payment total overflowed")
            })?;

        Ok(Self {
            total_students: students.len(),
            total_seats: seats.len(),
            available_seats: seats.iter().filter(|s| s.is_vacant()).count(),
            monthly_income,
            students_owing: students
                .iter()
                .filter(|s| s.status() == StudentStatus::Owing)
                .count(),
        })
    }
}
