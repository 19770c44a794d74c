//! Payment plan types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carrel_shared::types::{LibraryId, PaymentPlanId};

use crate::error::{EngineError, EngineResult};
use crate::ledger::money;
use crate::library::types::required;

/// How often a plan charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanFrequency {
    /// Every month.
    Monthly,
    /// Every three months.
    Quarterly,
    /// Every twelve months.
    Annually,
}

impl PlanFrequency {
    /// Number of months one charge covers.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annually => 12,
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annually => "annually",
        }
    }
}

impl std::fmt::Display for PlanFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "annually" => Ok(Self::Annually),
            _ => Err(format!("Unknown plan frequency: {s}")),
        }
    }
}

/// A named fee schedule owned by one library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPlan {
    /// Plan ID.
    pub id: PaymentPlanId,
    /// Owning library.
    pub library_id: LibraryId,
    /// Display name, unique only within the library.
    pub name: String,
    /// Charge per cycle.
    pub amount: Decimal,
    /// Cycle length.
    pub frequency: PlanFrequency,
}

impl PaymentPlan {
    /// The plan's charge spread over one month, rounded to cents.
    #[must_use]
    pub fn monthly_equivalent(&self) -> Decimal {
        (self.amount / Decimal::from(self.frequency.months())).round_dp(2)
    }
}

/// Input for creating a plan.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanInput {
    /// Display name.
    pub name: String,
    /// Charge per cycle.
    pub amount: Decimal,
    /// Cycle length.
    pub frequency: PlanFrequency,
}

impl PlanInput {
    /// Validates the input and builds a plan for `library_id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a blank name, or for an amount that is
    /// negative or outside the money range.
    pub fn into_plan(self, library_id: LibraryId) -> EngineResult<PaymentPlan> {
        Ok(PaymentPlan {
            id: PaymentPlanId::new(),
            library_id,
            name: required("name", &self.name)?,
            amount: non_negative(self.amount)?,
            frequency: self.frequency,
        })
    }
}

/// Partial update of a plan.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanPatch {
    /// New name.
    pub name: Option<String>,
    /// New charge per cycle.
    pub amount: Option<Decimal>,
    /// New cycle length.
    pub frequency: Option<PlanFrequency>,
}

impl PlanPatch {
    /// Applies the patch to `plan`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty patch, a blank name, or a
    /// negative amount. `plan` is left untouched on error.
    pub fn apply(self, plan: &PaymentPlan) -> EngineResult<PaymentPlan> {
        if self.name.is_none() && self.amount.is_none() && self.frequency.is_none() {
            return Err(EngineError::validation("patch", "no fields to update"));
        }

        let mut updated = plan.clone();
        if let Some(name) = self.name {
            updated.name = required("name", &name)?;
        }
        if let Some(amount) = self.amount {
            updated.amount = non_negative(amount)?;
        }
        if let Some(frequency) = self.frequency {
            updated.frequency = frequency;
        }
        Ok(updated)
    }
}

fn non_negative(amount: Decimal) -> EngineResult<Decimal> {
    if amount < Decimal::ZERO {
        return Err(EngineError::validation("amount", "cannot be negative"));
    }
    money("amount", amount)
}
