//! Balance presentation.

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

/// How a signed balance reads to a person.
///
/// Positive balances are owed, negative balances are credit from
/// overpayment, zero is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceDisplay {
    /// Amount owed.
    Due(Decimal),
    /// Overpayment held as credit (magnitude).
    Credit(Decimal),
    /// Nothing owed, no credit.
    Cleared,
}

impl From<Decimal> for BalanceDisplay {
    fn from(fees_due: Decimal) -> Self {
        if fees_due > Decimal::ZERO {
            Self::Due(fees_due)
        } else if fees_due < Decimal::ZERO {
            Self::Credit(-fees_due)
        } else {
            Self::Cleared
        }
    }
}

impl std::fmt::Display for BalanceDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Due(amount) => write!(f, "Due {}", cents(*amount)),
            Self::Credit(amount) => write!(f, "Credit {}", cents(*amount)),
            Self::Cleared => f.write_str("Cleared"),
        }
    }
}

impl Serialize for BalanceDisplay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn cents(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded
}
