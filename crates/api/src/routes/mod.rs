//! API route definitions.

use axum::{Router, middleware};
use chrono::{NaiveDate, Utc};

use crate::{AppState, middleware::auth_middleware};

pub mod dashboard;
pub mod health;
pub mod libraries;
pub mod managers;
pub mod payments;
pub mod plans;
pub mod seats;
pub mod students;

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    // Protected routes that require authentication
    let protected_routes = Router::new()
        .merge(libraries::routes())
        .merge(managers::routes())
        .merge(plans::routes())
        .merge(seats::routes())
        .merge(students::routes())
        .merge(payments::routes())
        .merge(dashboard::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Combine public and protected routes
    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}

/// Business date for defaults such as payment and enrollment dates.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}
