//! `SeaORM` entity definitions.
//!
//! One module per table. Conversion to domain records lives in the store.

pub mod libraries;
pub mod managers;
pub mod payment_plans;
pub mod payments;
pub mod seats;
pub mod students;

/// Common entity imports.
pub mod prelude {
    pub use super::libraries::Entity as Libraries;
    pub use super::managers::Entity as Managers;
    pub use super::payment_plans::Entity as PaymentPlans;
    pub use super::payments::Entity as Payments;
    pub use super::seats::Entity as Seats;
    pub use super::students::Entity as Students;
}
