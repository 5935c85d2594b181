//! Shared helpers for the black-box HTTP tests

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Devfile with one container exposing an editor port and one volume
pub const SAMPLE_DEVFILE: &str = r#"
schemaVersion: 2.2.0
components:
  - name: tooling-container
    container:
      image: registry.example.com/workspaces/ubuntu:22.04
      endpoints:
        - name: editor-server
          targetPort: 60001
      volumeMounts:
        - name: gl-workspace-data
          path: /projects
  - name: gl-workspace-data
    volume:
      size: 5Gi
"#;

/// Connection settings for a running server
pub struct TestConfig {
    pub base_url: String,
    pub client: reqwest::Client,
}

impl TestConfig {
    /// Build from `WORKSPACE_TEST_URL`, defaulting to a local server
    pub fn new() -> Self {
        let base_url = std::env::var("WORKSPACE_TEST_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self { base_url, client }
    }

    /// The config when the server answers its health check, `None` otherwise
    pub async fn connect() -> Option<Self> {
        let config = Self::new();
        match config.client.get(config.api_url("/health")).send().await {
            Ok(response) if response.status().is_success() => Some(config),
            _ => {
                eprintln!("Skipping: no server reachable at {}", config.base_url);
                None
            }
        }
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// Register an agent under a unique name
    pub async fn register_agent(&self) -> anyhow::Result<AgentResponse> {
        let request = CreateAgentRequest {
            name: format!("it-agent-{}", short_id()),
            dns_zone: "workspaces.example.com".to_string(),
            network_policy_enabled: Some(true),
        };

        let response = self
            .client
            .post(self.api_url("/agents"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Create a workspace for the agent under a unique name
    pub async fn create_workspace(&self, agent_id: i64) -> anyhow::Result<WorkspaceResponse> {
        let request = CreateWorkspaceRequest {
            agent_id,
            name: Some(format!("it-ws-{}", short_id())),
            processed_devfile: SAMPLE_DEVFILE.to_string(),
            variables: vec![
                VariableRequest::new("EDITOR", "vim", "environment"),
                VariableRequest::new("gitconfig", "[user]\n", "file"),
            ],
        };

        let response = self
            .client
            .post(self.api_url("/workspaces"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Send one reconcile poll as the agent
    pub async fn reconcile(
        &self,
        token: &str,
        request: &ReconcileRequest,
    ) -> anyhow::Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.api_url("/internal/reconcile"))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub dns_zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_policy_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AgentResponse {
    pub id: i64,
    pub name: String,
    pub dns_zone: String,
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VariableRequest {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub variable_type: String,
}

impl VariableRequest {
    pub fn new(key: &str, value: &str, variable_type: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            variable_type: variable_type.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateWorkspaceRequest {
    pub agent_id: i64,
    pub name: Option<String>,
    pub processed_devfile: String,
    pub variables: Vec<VariableRequest>,
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceResponse {
    pub id: i64,
    pub name: String,
    pub namespace: String,
    pub agent_id: i64,
    pub desired_state: String,
    pub actual_state: String,
    pub deployment_resource_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateDesiredStateRequest {
    pub desired_state: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceAgentInfo {
    pub name: String,
    pub namespace: String,
    pub actual_state: String,
    pub resource_version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileRequest {
    pub update_type: String,
    pub workspace_agent_infos: Vec<WorkspaceAgentInfo>,
}

impl ReconcileRequest {
    pub fn full() -> Self {
        Self {
            update_type: "full".to_string(),
            workspace_agent_infos: Vec::new(),
        }
    }

    pub fn partial(infos: Vec<WorkspaceAgentInfo>) -> Self {
        Self {
            update_type: "partial".to_string(),
            workspace_agent_infos: infos,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceRailsInfo {
    pub name: String,
    pub namespace: String,
    pub desired_state: String,
    pub actual_state: String,
    pub deployment_resource_version: Option<String>,
    pub config_to_apply: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileResponse {
    pub workspace_rails_infos: Vec<WorkspaceRailsInfo>,
}

impl ReconcileResponse {
    pub fn find(&self, name: &str) -> Option<&WorkspaceRailsInfo> {
        self.workspace_rails_infos.iter().find(|i| i.name == name)
    }
}

/// Kinds of the resources in a config, in order
pub fn kinds(config: &[Value]) -> Vec<String> {
    config
        .iter()
        .filter_map(|r| r["kind"].as_str().map(str::to_string))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
}
