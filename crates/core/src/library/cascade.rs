//! Library deletion order.

use serde::Serialize;

/// One step of deleting a library.
///
/// Children go before parents so that no step leaves a row pointing at a
/// deleted one. Every step only removes what is still there, which makes
/// re-running an interrupted deletion safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStep {
    /// Payment journal rows.
    Payments,
    /// Student records.
    Students,
    /// Seat inventory.
    Seats,
    /// Payment plan catalog.
    PaymentPlans,
    /// Managers bound to the library lose their binding (records are kept).
    ManagerBindings,
    /// The library record itself.
    Library,
}

impl CascadeStep {
    /// Dependency order for deletion.
    pub const ORDER: [Self; 6] = [
        Self::Payments,
        Self::Students,
        Self::Seats,
        Self::PaymentPlans,
        Self::ManagerBindings,
        Self::Library,
    ];

    /// Stable name for logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Payments => "payments",
            Self::Students => "students",
            Self::Seats => "seats",
            Self::PaymentPlans => "payment_plans",
            Self::ManagerBindings => "manager_bindings",
            Self::Library => "library",
        }
    }
}

impl std::fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(step: CascadeStep) -> usize {
        CascadeStep::ORDER.iter().position(|s| *s == step).unwrap()
    }

    #[test]
    fn test_children_are_removed_before_parents() {
        assert!(position(CascadeStep::Payments) < position(CascadeStep::Students));
        assert!(position(CascadeStep::Students) < position(CascadeStep::Seats));
        assert!(position(CascadeStep::Seats) < position(CascadeStep::PaymentPlans));
        assert!(position(CascadeStep::PaymentPlans) < position(CascadeStep::ManagerBindings));
        assert_eq!(CascadeStep::ORDER.last(), Some(&CascadeStep::Library));
    }

    #[test]
    fn test_display_matches_as_str() {
        for step in CascadeStep::ORDER {
            assert_eq!(step.to_string(), step.as_str());
        }
    }
}
