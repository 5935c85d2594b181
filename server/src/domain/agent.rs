//! Cluster agent domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote development settings of one cluster agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDevelopmentAgentConfig {
    /// DNS zone workspaces of this agent are served under
    pub dns_zone: String,

    /// Whether a NetworkPolicy is generated for each workspace
    pub network_policy_enabled: bool,

    /// Namespace the workspaces proxy runs in; the only allowed ingress source
    pub gitlab_workspaces_proxy_namespace: String,
}

/// Cluster agent through which workspaces are provisioned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub config: RemoteDevelopmentAgentConfig,
    pub created_at: DateTime<Utc>,
}

/// Parameters for registering an agent
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgentParams {
    pub name: String,
    pub dns_zone: String,
    #[serde(default = "default_network_policy_enabled")]
    pub network_policy_enabled: bool,
    #[serde(default = "default_proxy_namespace")]
    pub gitlab_workspaces_proxy_namespace: String,
}

fn default_network_policy_enabled() -> bool {
    true
}

fn default_proxy_namespace() -> String {
    "gitlab-workspaces".to_string()
}
