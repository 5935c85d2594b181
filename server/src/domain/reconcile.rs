//! Reconcile protocol types exchanged with cluster agents

use serde::{Deserialize, Serialize};

use crate::domain::resource::Resource;
use crate::domain::workspace::WorkspaceState;

/// Kind of reconcile poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Agent asks for every workspace it owns, secrets included
    Full,
    /// Agent asks only for what changed
    Partial,
}

/// Observed state of one workspace as reported by the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceAgentInfo {
    pub name: String,
    pub namespace: String,
    pub actual_state: WorkspaceState,
    #[serde(default)]
    pub resource_version: Option<String>,
    #[serde(default)]
    pub error_details: Option<serde_json::Value>,
}

/// Reconcile request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub update_type: UpdateType,
    #[serde(default)]
    pub workspace_agent_infos: Vec<WorkspaceAgentInfo>,
}

/// What the agent should do for one workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRailsInfo {
    pub name: String,
    pub namespace: String,
    pub desired_state: WorkspaceState,
    pub actual_state: WorkspaceState,
    pub deployment_resource_version: Option<String>,
    /// `None` when nothing needs to be applied this round
    pub config_to_apply: Option<Vec<Resource>>,
}

/// Reconcile response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub workspace_rails_infos: Vec<WorkspaceRailsInfo>,
}
