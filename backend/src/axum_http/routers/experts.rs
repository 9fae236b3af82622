use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use crates::{
    domain::value_objects::plans::ChangePlanModel,
    infra::db::repositories::{
        commission_transactions::CommissionTransactionPostgres, eligibility::EligibilityPostgres,
        plan_rates::PlanRatePostgres, subscription_plans::SubscriptionPlanPostgres,
    },
};
use serde::Deserialize;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{
        commissions::CommissionUseCase, eligibility::EligibilityUseCase,
        subscription_plans::SubscriptionPlanUseCase,
    },
};

pub type CommissionUseCasePg =
    CommissionUseCase<SubscriptionPlanPostgres, PlanRatePostgres, CommissionTransactionPostgres>;
pub type EligibilityUseCasePg = EligibilityUseCase<EligibilityPostgres>;
pub type SubscriptionPlanUseCasePg = SubscriptionPlanUseCase<SubscriptionPlanPostgres, PlanRatePostgres>;

#[derive(Clone)]
pub struct ExpertRouteState {
    commissions: Arc<CommissionUseCasePg>,
    eligibility: Arc<EligibilityUseCasePg>,
    plans: Arc<SubscriptionPlanUseCasePg>,
}

pub fn routes(
    commissions: Arc<CommissionUseCasePg>,
    eligibility: Arc<EligibilityUseCasePg>,
    plans: Arc<SubscriptionPlanUseCasePg>,
) -> Router {
    Router::new()
        .route("/me/eligibility", get(get_eligibility))
        .route("/me/commissions", get(list_commissions))
        .route("/me/plan", put(change_plan))
        .with_state(ExpertRouteState {
            commissions,
            eligibility,
            plans,
        })
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_eligibility(
    State(state): State<ExpertRouteState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.eligibility.get(auth.account_id()).await?))
}

pub async fn list_commissions(
    State(state): State<ExpertRouteState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .commissions
        .list_for_expert(auth.account_id(), page.limit, page.offset)
        .await?;
    Ok(Json(rows))
}

pub async fn change_plan(
    State(state): State<ExpertRouteState>,
    auth: AuthUser,
    Json(model): Json<ChangePlanModel>,
) -> Result<impl IntoResponse, AppError> {
    let plan = state
        .plans
        .change_plan(auth.account_id(), model, Utc::now())
        .await?;
    Ok(Json(plan))
}
