//! Input snapshot of one desired config generation

use crate::domain::agent::Agent;
use crate::domain::workspace::{Workspace, WorkspaceState, WorkspaceVariable};
use crate::error::{Error, Result};

/// Everything the generator needs about one workspace, assembled once by the
/// caller from the workspace and its agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceReconcileContext {
    pub workspace_id: i64,
    pub name: String,
    pub namespace: String,
    pub agent_id: i64,
    pub desired_state: WorkspaceState,
    pub processed_devfile: String,
    pub dns_zone: String,
    pub variables: Vec<WorkspaceVariable>,
    pub network_policy_enabled: bool,
    pub proxy_namespace: String,
}

impl WorkspaceReconcileContext {
    /// Assemble the context, checking that the workspace belongs to the agent
    pub fn new(workspace: &Workspace, agent: &Agent) -> Result<Self> {
        if workspace.agent_id != agent.id {
            return Err(Error::Internal(format!(
                "workspace {} belongs to agent {}, not {}",
                workspace.name, workspace.agent_id, agent.id
            )));
        }

        Ok(Self {
            workspace_id: workspace.id,
            name: workspace.name.clone(),
            namespace: workspace.namespace.clone(),
            agent_id: agent.id,
            desired_state: workspace.desired_state,
            processed_devfile: workspace.processed_devfile.clone(),
            dns_zone: workspace.dns_zone.clone(),
            variables: workspace.variables.clone(),
            network_policy_enabled: agent.config.network_policy_enabled,
            proxy_namespace: agent.config.gitlab_workspaces_proxy_namespace.clone(),
        })
    }

    /// Hostname template the workspaces proxy expands once per exposed port
    pub fn domain_template(&self) -> String {
        format!("{{{{.port}}}}-{}.{}", self.name, self.dns_zone)
    }

    /// Workload replicas implied by the desired state
    pub fn replicas(&self) -> u32 {
        self.desired_state.replicas()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::agent::RemoteDevelopmentAgentConfig;
    use crate::domain::workspace::VariableType;

    pub(crate) const SAMPLE_DEVFILE: &str = r#"
schemaVersion: 2.2.0
components:
  - name: tooling-container
    attributes:
      gl/inject-editor: true
    container:
      image: registry.example.com/workspaces/ubuntu:22.04
      memoryLimit: 1Gi
      env:
        - name: EDITOR_PORT
          value: "60001"
      endpoints:
        - name: editor-server
          targetPort: 60001
      volumeMounts:
        - name: gl-workspace-data
          path: /projects
  - name: gl-workspace-data
    volume:
      size: 15Gi
"#;

    pub(crate) fn sample_context(desired_state: WorkspaceState) -> WorkspaceReconcileContext {
        WorkspaceReconcileContext {
            workspace_id: 7,
            name: "ws1".to_string(),
            namespace: "ns1".to_string(),
            agent_id: 1,
            desired_state,
            processed_devfile: SAMPLE_DEVFILE.to_string(),
            dns_zone: "example.com".to_string(),
            variables: vec![
                WorkspaceVariable::new("A", "1", VariableType::Environment),
                WorkspaceVariable::new("B", "x", VariableType::File),
            ],
            network_policy_enabled: true,
            proxy_namespace: "gitlab-workspaces".to_string(),
        }
    }

    fn sample_agent(id: i64) -> Agent {
        Agent {
            id,
            name: "agent".to_string(),
            config: RemoteDevelopmentAgentConfig {
                dns_zone: "example.com".to_string(),
                network_policy_enabled: false,
                gitlab_workspaces_proxy_namespace: "proxy".to_string(),
            },
            created_at: Utc::now(),
        }
    }

    fn sample_workspace(agent_id: i64) -> Workspace {
        let now = Utc::now();
        Workspace {
            id: 7,
            name: "ws1".to_string(),
            namespace: "ns1".to_string(),
            agent_id,
            desired_state: WorkspaceState::Stopped,
            desired_state_updated_at: now,
            actual_state: WorkspaceState::Running,
            deployment_resource_version: None,
            responded_to_agent_at: None,
            processed_devfile: SAMPLE_DEVFILE.to_string(),
            dns_zone: "example.com".to_string(),
            variables: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_domain_template() {
        let ctx = sample_context(WorkspaceState::Running);
        assert_eq!(ctx.domain_template(), "{{.port}}-ws1.example.com");
    }

    #[test]
    fn test_new_copies_agent_config() {
        let ctx = WorkspaceReconcileContext::new(&sample_workspace(3), &sample_agent(3)).unwrap();
        assert_eq!(ctx.agent_id, 3);
        assert!(!ctx.network_policy_enabled);
        assert_eq!(ctx.proxy_namespace, "proxy");
        assert_eq!(ctx.desired_state, WorkspaceState::Stopped);
        assert_eq!(ctx.replicas(), 0);
    }

    #[test]
    fn test_new_rejects_foreign_agent() {
        let result = WorkspaceReconcileContext::new(&sample_workspace(3), &sample_agent(4));
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
