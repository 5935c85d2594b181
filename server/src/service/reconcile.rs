//! Agent reconcile protocol
//!
//! Agents poll with the workspace states they observed and receive the
//! desired state plus, when something changed, the resources to apply.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::agent::Agent;
use crate::domain::reconcile::{
    ReconcileRequest, ReconcileResponse, UpdateType, WorkspaceAgentInfo, WorkspaceRailsInfo,
};
use crate::domain::resource::Resource;
use crate::domain::workspace::Workspace;
use crate::error::Result;
use crate::infra::workspace_repository::WorkspaceRepository;
use crate::service::desired_config::{DesiredConfigGenerator, WorkspaceReconcileContext};

/// Reconcile service answering agent polls
pub struct ReconcileService {
    repository: Arc<WorkspaceRepository>,
    generator: DesiredConfigGenerator,
}

impl ReconcileService {
    /// Create a new reconcile service
    pub fn new(repository: Arc<WorkspaceRepository>, generator: DesiredConfigGenerator) -> Self {
        Self {
            repository,
            generator,
        }
    }

    /// Handle one poll from an authenticated agent
    #[instrument(skip_all, fields(agent = %agent.name, update_type = ?request.update_type))]
    pub async fn reconcile(
        &self,
        agent: &Agent,
        request: ReconcileRequest,
    ) -> Result<ReconcileResponse> {
        let mut reported = HashSet::new();
        for info in &request.workspace_agent_infos {
            match self.record_agent_info(agent, info).await {
                Ok(Some(id)) => {
                    reported.insert(id);
                }
                Ok(None) => {}
                Err(e) => error!(workspace = %info.name, "Failed to record agent info: {}", e),
            }
        }

        // Captured before reading so that desired state changes racing this
        // poll are picked up by the next one.
        let responded_at = Utc::now();
        let workspaces = self.repository.list_for_agent(agent.id).await?;

        let mut infos = Vec::new();
        let mut responded = Vec::new();
        for workspace in &workspaces {
            let selected = match request.update_type {
                UpdateType::Full => !workspace.is_fully_terminated(),
                UpdateType::Partial => {
                    reported.contains(&workspace.id)
                        || workspace.desired_state_updated_since_response()
                }
            };
            if !selected {
                continue;
            }

            let config_to_apply = self.config_to_apply(agent, workspace, request.update_type);
            infos.push(WorkspaceRailsInfo {
                name: workspace.name.clone(),
                namespace: workspace.namespace.clone(),
                desired_state: workspace.desired_state,
                actual_state: workspace.actual_state,
                deployment_resource_version: workspace.deployment_resource_version.clone(),
                config_to_apply,
            });
            responded.push(workspace.id);
        }

        self.repository.mark_responded(&responded, responded_at).await?;

        info!(
            "Answered {} of {} workspaces ({} reported)",
            infos.len(),
            workspaces.len(),
            request.workspace_agent_infos.len()
        );

        Ok(ReconcileResponse {
            workspace_rails_infos: infos,
        })
    }

    /// Persist what the agent observed. Returns the workspace id, or `None`
    /// when the agent reported a workspace this agent does not own.
    async fn record_agent_info(
        &self,
        agent: &Agent,
        info: &WorkspaceAgentInfo,
    ) -> Result<Option<i64>> {
        let Some(workspace) = self.repository.find_by_name(agent.id, &info.name).await? else {
            warn!(workspace = %info.name, "Agent reported an unknown workspace, skipping");
            return Ok(None);
        };

        if let Some(details) = &info.error_details {
            warn!(workspace = %workspace.name, details = %details, "Agent reported an error");
        }

        if is_stale(
            workspace.deployment_resource_version.as_deref(),
            info.resource_version.as_deref(),
        ) {
            debug!(
                workspace = %workspace.name,
                recorded = ?workspace.deployment_resource_version,
                reported = ?info.resource_version,
                "Ignoring stale actual state"
            );
            return Ok(Some(workspace.id));
        }

        if workspace.actual_state != info.actual_state {
            info!(
                "Workspace {} actual state changed from {} to {}",
                workspace.name, workspace.actual_state, info.actual_state
            );
        }
        self.repository
            .update_actual_state(workspace.id, info.actual_state, info.resource_version.as_deref())
            .await?;

        Ok(Some(workspace.id))
    }

    /// Resources to send for one workspace, `None` when the agent should keep
    /// what it has.
    fn config_to_apply(
        &self,
        agent: &Agent,
        workspace: &Workspace,
        update_type: UpdateType,
    ) -> Option<Vec<Resource>> {
        if workspace.is_fully_terminated() {
            return None;
        }

        let full = update_type == UpdateType::Full;
        if !full && !workspace.desired_state_updated_since_response() {
            return None;
        }
        let include_all_resources = full || workspace.is_new_to_agent();

        let result = WorkspaceReconcileContext::new(workspace, agent)
            .and_then(|ctx| self.generator.generate(&ctx, include_all_resources));

        match result {
            Ok(resources) if resources.is_empty() => {
                warn!(
                    workspace = %workspace.name,
                    desired_state = %workspace.desired_state,
                    "No config to apply, devfile produced no workloads"
                );
                None
            }
            Ok(resources) => Some(resources),
            Err(e) => {
                error!(workspace = %workspace.name, "Failed to generate desired config: {}", e);
                None
            }
        }
    }
}

/// A report is stale when both versions are numeric and the reported one is
/// older than what is recorded.
fn is_stale(recorded: Option<&str>, reported: Option<&str>) -> bool {
    match (recorded, reported) {
        (Some(recorded), Some(reported)) => {
            match (recorded.parse::<u64>(), reported.parse::<u64>()) {
                (Ok(recorded), Ok(reported)) => reported < recorded,
                _ => false,
            }
        }
        _ => false,
    }
}
