//! Agent reconcile handler

use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    Json,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

use crate::domain::agent::Agent;
use crate::domain::reconcile::{ReconcileRequest, ReconcileResponse};
use crate::error::Error;
use crate::service::feature::REMOTE_DEVELOPMENT;
use crate::{AppState, Result};

/// Agent resolved from the bearer token and allowed to use remote
/// development. Extracted from the request head, so credentials are checked
/// before the body is read.
pub struct AuthorizedAgent(pub Agent);

impl FromRequestParts<AppState> for AuthorizedAgent {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Some(Authorization(bearer)) = parts.headers.typed_get::<Authorization<Bearer>>() else {
            return Err(Error::Unauthorized("missing bearer token".to_string()));
        };
        let agent = state.agent_service.authenticate(bearer.token()).await?;

        if !state.feature_gate.is_enabled(REMOTE_DEVELOPMENT, &agent.name) {
            return Err(Error::FeatureDisabled(format!(
                "{} is not available for agent {}",
                REMOTE_DEVELOPMENT, agent.name
            )));
        }

        Ok(Self(agent))
    }
}

/// Answer one agent poll
pub async fn reconcile(
    State(state): State<AppState>,
    AuthorizedAgent(agent): AuthorizedAgent,
    Json(req): Json<ReconcileRequest>,
) -> Result<(StatusCode, Json<ReconcileResponse>)> {
    let response = state.reconcile_service.reconcile(&agent, req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}
