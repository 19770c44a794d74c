//! Payment plan catalog.

pub mod types;

pub use types::{PaymentPlan, PlanFrequency, PlanInput, PlanPatch};
