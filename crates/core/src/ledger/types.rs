//! Ledger types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carrel_shared::types::{LibraryId, PaymentId, StudentId};

use super::money;
use crate::store::{StoreError, StoreResult};
use crate::student::Student;

/// A journaled payment. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment ID.
    pub id: PaymentId,
    /// Owning library.
    pub library_id: LibraryId,
    /// Paying student.
    pub student_id: StudentId,
    /// Amount paid, always positive.
    pub amount: Decimal,
    /// Business date of the payment.
    pub payment_date: NaiveDate,
    /// Free-form note.
    pub notes: Option<String>,
    /// When the row was written.
    pub recorded_at: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPayment {
    /// Amount paid.
    pub amount: Decimal,
    /// Business date. Defaults to today.
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
    /// Free-form note.
    #[serde(default)]
    pub notes: Option<String>,
}

/// How a ledger change moves the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum BalanceChange {
    /// Subtract the amount. The result may go negative (credit).
    Decrease(Decimal),
    /// Add the amount.
    Increase(Decimal),
    /// Overwrite the balance.
    Set(Decimal),
}

impl BalanceChange {
    /// Applies the change to `balance`.
    ///
    /// Returns `None` if the result overflows or leaves the storable money
    /// range.
    #[must_use]
    pub fn apply(self, balance: Decimal) -> Option<Decimal> {
        match self {
            Self::Decrease(amount) => balance.checked_sub(amount),
            Self::Increase(amount) => balance.checked_add(amount),
            Self::Set(amount) => Some(amount),
        }
        .filter(|result| money::fits(*result))
    }
}

/// One balance mutation and its journal row, written atomically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerChange {
    /// Library of the student.
    pub library_id: LibraryId,
    /// Student whose balance moves.
    pub student_id: StudentId,
    /// Balance movement.
    pub balance: BalanceChange,
    /// New `last_payment_date`, if the change records one.
    pub last_payment_date: Option<NaiveDate>,
    /// Clear `deactivated` when the resulting balance is settled.
    pub settle_reactivates: bool,
    /// Journal row to insert alongside.
    pub payment: Option<Payment>,
}

impl LedgerChange {
    /// Applies the change to `student` in place.
    ///
    /// Stores call this on the freshly read row inside their write, so the
    /// balance arithmetic lives in one place for every backend. `student` is
    /// left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BalanceOutOfRange`] if the new balance cannot be
    /// stored.
    pub fn apply_to(&self, student: &mut Student) -> StoreResult<()> {
        student.fees_due = self
            .balance
            .apply(student.fees_due)
            .ok_or(StoreError::BalanceOutOfRange {
                student_id: student.id,
            })?;
        if let Some(date) = self.last_payment_date {
            student.last_payment_date = Some(date);
        }
        if self.settle_reactivates && student.fees_due <= Decimal::ZERO {
            student.deactivated = false;
        }
        Ok(())
    }
}
