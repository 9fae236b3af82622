use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use backend::usecases::eligibility::{EligibilityError, EligibilityUseCase};
use chrono::Utc;
use crates::infra::db::repositories::eligibility::EligibilityPostgres;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::config_model::DotEnvyConfig;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/eligibility/recompute" \
//     -H "Authorization: Bearer $INTERNAL_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"expert_id":"7a1c2b0e-52a4-4a9e-9a55-4f7f2d8c1e10"}'

pub type EligibilityUseCasePg = EligibilityUseCase<EligibilityPostgres>;

#[derive(Clone)]
pub struct EligibilityRouteState {
    config: Arc<DotEnvyConfig>,
    usecase: Arc<EligibilityUseCasePg>,
}

pub fn routes(config: Arc<DotEnvyConfig>, usecase: Arc<EligibilityUseCasePg>) -> Router {
    Router::new()
        .route("/recompute", post(recompute))
        .with_state(EligibilityRouteState { config, usecase })
}

#[derive(Debug, Default, Deserialize)]
pub struct RecomputeRequest {
    pub expert_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RecomputeResponse {
    pub evaluated: usize,
    pub failed: usize,
    pub newly_eligible: usize,
}

pub async fn recompute(
    State(state): State<EligibilityRouteState>,
    headers: HeaderMap,
    payload: Option<Json<RecomputeRequest>>,
) -> Response {
    let expected_token = match state.config.internal.token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "internal token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        return (status, "unauthorized").into_response();
    }

    let Json(request) = payload.unwrap_or_default();
    let now = Utc::now();

    match request.expert_id {
        Some(expert_id) => match state.usecase.recompute(expert_id, now).await {
            Ok(snapshot) => Json(snapshot).into_response(),
            Err(err) => recompute_failed(err),
        },
        None => match state.usecase.recompute_all(now).await {
            Ok(summary) => {
                info!(
                    evaluated = summary.evaluated,
                    newly_eligible = summary.newly_eligible,
                    "eligibility_recompute: manual run finished"
                );
                Json(RecomputeResponse {
                    evaluated: summary.evaluated,
                    failed: summary.failed,
                    newly_eligible: summary.newly_eligible,
                })
                .into_response()
            }
            Err(err) => recompute_failed(err),
        },
    }
}

fn recompute_failed(err: EligibilityError) -> Response {
    error!(error = ?err, "eligibility_recompute: usecase failed");
    (err.status_code(), "eligibility recompute failed").into_response()
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_must_match_exactly() {
        assert_eq!(authorize_bearer(&headers_with("Bearer s3cret"), "s3cret"), Ok(()));
        assert_eq!(
            authorize_bearer(&headers_with("Bearer wrong"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&headers_with("s3cret"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&HeaderMap::new(), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
