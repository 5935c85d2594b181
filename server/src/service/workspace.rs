//! Workspace service

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::workspace::{CreateWorkspaceParams, Workspace, WorkspaceState};
use crate::error::{Error, Result};
use crate::infra::sqlite::AgentRepository;
use crate::infra::workspace_repository::{NewWorkspace, WorkspaceRepository};
use crate::service::desired_config::devfile::parse_devfile;

/// Kubernetes object names are DNS labels
const MAX_NAME_LEN: usize = 63;

/// Workspace service for managing workspace lifecycle intent
pub struct WorkspaceService {
    repository: Arc<WorkspaceRepository>,
    agent_repository: Arc<AgentRepository>,
}

impl WorkspaceService {
    /// Create a new workspace service
    pub fn new(repository: Arc<WorkspaceRepository>, agent_repository: Arc<AgentRepository>) -> Self {
        Self {
            repository,
            agent_repository,
        }
    }

    /// Create a new workspace
    pub async fn create(&self, params: CreateWorkspaceParams) -> Result<Workspace> {
        let agent = self.agent_repository.get(params.agent_id).await?;

        let name = match params.name {
            Some(name) => name,
            None => format!(
                "workspace-{}-{}",
                agent.id,
                &Uuid::new_v4().simple().to_string()[..8]
            ),
        };
        validate_dns_label("name", &name)?;

        let namespace = match params.namespace {
            Some(namespace) => namespace,
            None => default_namespace(agent.id, &name),
        };
        validate_dns_label("namespace", &namespace)?;

        let desired_state = params.desired_state.unwrap_or(WorkspaceState::Running);
        if !desired_state.is_valid_desired() {
            return Err(Error::InvalidParameter(format!(
                "{} is not a valid desired state",
                desired_state
            )));
        }

        parse_devfile(&params.processed_devfile)?;

        if let Some(variable) = params.variables.iter().find(|v| v.key.is_empty()) {
            return Err(Error::InvalidParameter(format!(
                "variable key must not be empty (value of type {})",
                variable.variable_type.as_str()
            )));
        }

        info!(
            "Creating workspace {} in namespace {} for agent {}",
            name, namespace, agent.name
        );

        self.repository
            .create(NewWorkspace {
                name,
                namespace,
                agent_id: agent.id,
                desired_state,
                actual_state: WorkspaceState::CreationRequested,
                processed_devfile: params.processed_devfile,
                dns_zone: agent.config.dns_zone,
                variables: params.variables,
            })
            .await
    }

    /// Get a workspace by ID
    pub async fn get(&self, id: i64) -> Result<Workspace> {
        self.repository.get(id).await
    }

    /// List all workspaces
    pub async fn list(&self) -> Result<Vec<Workspace>> {
        self.repository.list().await
    }

    /// Change what the workspace should be doing. The next reconcile poll
    /// carries the new configuration to the agent.
    pub async fn update_desired_state(&self, id: i64, state: WorkspaceState) -> Result<Workspace> {
        if !state.is_valid_desired() {
            return Err(Error::InvalidParameter(format!(
                "{} is not a valid desired state",
                state
            )));
        }

        let workspace = self.repository.get(id).await?;
        if workspace.desired_state == state {
            return Ok(workspace);
        }
        if workspace.desired_state == WorkspaceState::Terminated {
            return Err(Error::InvalidStateTransition {
                from: workspace.desired_state.to_string(),
                to: state.to_string(),
            });
        }

        self.repository.update_desired_state(id, state).await?;
        info!(
            "Workspace {} desired state changed from {} to {}",
            workspace.name, workspace.desired_state, state
        );

        self.repository.get(id).await
    }
}

fn default_namespace(agent_id: i64, name: &str) -> String {
    let mut namespace = format!("gl-rd-ns-{}-{}", agent_id, name);
    namespace.truncate(MAX_NAME_LEN);
    namespace.trim_end_matches('-').to_string()
}

fn validate_dns_label(field: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= MAX_NAME_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "{} must be a lowercase DNS label of at most {} characters: {}",
            field, MAX_NAME_LEN, value
        )))
    }
}
