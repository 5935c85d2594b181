//! Workspace HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::workspace::{CreateWorkspaceParams, VariableType, Workspace, WorkspaceState};
use crate::{AppState, Result};

// ==================== Request/Response Types ====================

/// Update desired state request
#[derive(Debug, Deserialize)]
pub struct UpdateDesiredStateRequest {
    pub desired_state: WorkspaceState,
}

/// Variable summary; values are never echoed back
#[derive(Debug, Serialize)]
pub struct VariableResponse {
    pub key: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
}

/// Workspace response
#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub id: i64,
    pub name: String,
    pub namespace: String,
    pub agent_id: i64,
    pub desired_state: WorkspaceState,
    pub actual_state: WorkspaceState,
    pub deployment_resource_version: Option<String>,
    pub dns_zone: String,
    pub variables: Vec<VariableResponse>,
    pub desired_state_updated_at: String,
    pub responded_to_agent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Workspace> for WorkspaceResponse {
    fn from(w: Workspace) -> Self {
        Self {
            id: w.id,
            name: w.name,
            namespace: w.namespace,
            agent_id: w.agent_id,
            desired_state: w.desired_state,
            actual_state: w.actual_state,
            deployment_resource_version: w.deployment_resource_version,
            dns_zone: w.dns_zone,
            variables: w
                .variables
                .into_iter()
                .map(|v| VariableResponse {
                    key: v.key,
                    variable_type: v.variable_type,
                })
                .collect(),
            desired_state_updated_at: w.desired_state_updated_at.to_rfc3339(),
            responded_to_agent_at: w.responded_to_agent_at.map(|t| t.to_rfc3339()),
            created_at: w.created_at.to_rfc3339(),
            updated_at: w.updated_at.to_rfc3339(),
        }
    }
}

/// List workspaces response
#[derive(Debug, Serialize)]
pub struct ListWorkspacesResponse {
    pub workspaces: Vec<WorkspaceResponse>,
    pub total: usize,
}

// ==================== Handlers ====================

/// Create a new workspace
pub async fn create_workspace(
    State(state): State<AppState>,
    Json(params): Json<CreateWorkspaceParams>,
) -> Result<(StatusCode, Json<WorkspaceResponse>)> {
    let workspace = state.workspace_service.create(params).await?;
    Ok((StatusCode::CREATED, Json(workspace.into())))
}

/// Get a workspace by ID
pub async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<WorkspaceResponse>> {
    let workspace = state.workspace_service.get(id).await?;
    Ok(Json(workspace.into()))
}

/// List all workspaces
pub async fn list_workspaces(
    State(state): State<AppState>,
) -> Result<Json<ListWorkspacesResponse>> {
    let workspaces = state.workspace_service.list().await?;
    let total = workspaces.len();

    Ok(Json(ListWorkspacesResponse {
        workspaces: workspaces.into_iter().map(WorkspaceResponse::from).collect(),
        total,
    }))
}

/// Change the desired state of a workspace
pub async fn update_desired_state(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateDesiredStateRequest>,
) -> Result<Json<WorkspaceResponse>> {
    let workspace = state
        .workspace_service
        .update_desired_state(id, req.desired_state)
        .await?;
    Ok(Json(workspace.into()))
}
