//! Payment plan routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use rust_decimal::Decimal;
use serde::Serialize;

use carrel_core::EngineError;
use carrel_core::Tenanted;
use carrel_core::plan::{PaymentPlan, PlanInput, PlanPatch};
use carrel_shared::types::PaymentPlanId;

use crate::{
    AppState,
    error::ApiError,
    middleware::{ReadScope, WriteContext},
};

/// Creates the payment plan routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment-plans", get(list_plans).post(create_plan))
        .route(
            "/payment-plans/{plan_id}",
            get(get_plan).patch(update_plan),
        )
}

/// Plan as returned to clients.
#[derive(Debug, Serialize)]
pub struct PlanView {
    /// The plan.
    #[serde(flatten)]
    pub plan: PaymentPlan,
    /// Charge spread over one month.
    pub monthly_equivalent: Decimal,
}

impl From<PaymentPlan> for PlanView {
    fn from(plan: PaymentPlan) -> Self {
        Self {
            monthly_equivalent: plan.monthly_equivalent(),
            plan,
        }
    }
}

fn view(tenanted: Tenanted<PaymentPlan>) -> Tenanted<PlanView> {
    Tenanted {
        library_name: tenanted.library_name,
        record: tenanted.record.into(),
    }
}

async fn list_plans(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
) -> Result<impl IntoResponse, ApiError> {
    let plans = state.engine.list_payment_plans(scope).await?;
    Ok(Json(plans.into_iter().map(view).collect::<Vec<_>>()))
}

async fn get_plan(
    State(state): State<AppState>,
    ReadScope(scope): ReadScope,
    Path(plan_id): Path<PaymentPlanId>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state
        .engine
        .get_payment_plan(scope, plan_id)
        .await?
        .ok_or_else(|| EngineError::not_found("payment_plan", plan_id))?;
    Ok(Json(view(plan)))
}

async fn create_plan(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Json(payload): Json<PlanInput>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.engine.create_payment_plan(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(PlanView::from(plan))))
}

async fn update_plan(
    State(state): State<AppState>,
    WriteContext(ctx): WriteContext,
    Path(plan_id): Path<PaymentPlanId>,
    Json(payload): Json<PlanPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state
        .engine
        .update_payment_plan(&ctx, plan_id, payload)
        .await?;
    Ok(Json(PlanView::from(plan)))
}
