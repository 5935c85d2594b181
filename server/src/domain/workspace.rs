//! Workspace domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workspace lifecycle state
///
/// Used both for the desired state (what the user asked for) and the actual
/// state (what the cluster agent last observed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkspaceState {
    Unknown,
    CreationRequested,
    Starting,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
    Failed,
    Error,
    RotateCredentials,
}

impl WorkspaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceState::Unknown => "Unknown",
            WorkspaceState::CreationRequested => "CreationRequested",
            WorkspaceState::Starting => "Starting",
            WorkspaceState::Running => "Running",
            WorkspaceState::Stopping => "Stopping",
            WorkspaceState::Stopped => "Stopped",
            WorkspaceState::Terminating => "Terminating",
            WorkspaceState::Terminated => "Terminated",
            WorkspaceState::Failed => "Failed",
            WorkspaceState::Error => "Error",
            WorkspaceState::RotateCredentials => "RotateCredentials",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Unknown" => Some(WorkspaceState::Unknown),
            "CreationRequested" => Some(WorkspaceState::CreationRequested),
            "Starting" => Some(WorkspaceState::Starting),
            "Running" => Some(WorkspaceState::Running),
            "Stopping" => Some(WorkspaceState::Stopping),
            "Stopped" => Some(WorkspaceState::Stopped),
            "Terminating" => Some(WorkspaceState::Terminating),
            "Terminated" => Some(WorkspaceState::Terminated),
            "Failed" => Some(WorkspaceState::Failed),
            "Error" => Some(WorkspaceState::Error),
            "RotateCredentials" => Some(WorkspaceState::RotateCredentials),
            _ => None,
        }
    }

    /// Number of workload replicas implied by this state when used as the
    /// desired state. Only a workspace being created or meant to run is
    /// scheduled.
    pub fn replicas(&self) -> u32 {
        match self {
            WorkspaceState::CreationRequested | WorkspaceState::Running => 1,
            _ => 0,
        }
    }

    /// States a user or the system may request as the desired state
    pub fn is_valid_desired(&self) -> bool {
        matches!(
            self,
            WorkspaceState::Running
                | WorkspaceState::Stopped
                | WorkspaceState::Terminated
                | WorkspaceState::RotateCredentials
        )
    }
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a workspace variable is injected into the workspace pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    /// Exposed as an environment variable
    #[serde(alias = "env_var")]
    Environment,
    /// Written to a file under the variables mount
    File,
}

impl VariableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::Environment => "environment",
            VariableType::File => "file",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "environment" | "env_var" => Some(VariableType::Environment),
            "file" => Some(VariableType::File),
            _ => None,
        }
    }
}

/// A key/value pair configured on a workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceVariable {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
}

impl WorkspaceVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>, variable_type: VariableType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            variable_type,
        }
    }
}

/// Workspace entity
///
/// A workspace is a development environment provisioned in a cluster through
/// one agent. Its name prefixes every Kubernetes resource derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Unique identifier
    pub id: i64,

    /// Unique name, used as the prefix of all derived resource names
    pub name: String,

    /// Target cluster namespace
    pub namespace: String,

    /// Owning cluster agent
    pub agent_id: i64,

    /// Lifecycle state requested by the user or the system
    pub desired_state: WorkspaceState,

    /// When the desired state last changed
    pub desired_state_updated_at: DateTime<Utc>,

    /// Lifecycle state last reported by the agent
    pub actual_state: WorkspaceState,

    /// Resource version of the deployment the agent last reported
    pub deployment_resource_version: Option<String>,

    /// When this workspace was last included in a reconcile response
    pub responded_to_agent_at: Option<DateTime<Utc>>,

    /// Fully resolved devfile document (YAML)
    pub processed_devfile: String,

    /// DNS zone used to build the per-workspace host template
    pub dns_zone: String,

    /// Variables in declaration order
    pub variables: Vec<WorkspaceVariable>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// The agent has never been sent this workspace
    pub fn is_new_to_agent(&self) -> bool {
        self.responded_to_agent_at.is_none()
    }

    /// The desired state changed after the last reconcile response
    pub fn desired_state_updated_since_response(&self) -> bool {
        match self.responded_to_agent_at {
            Some(responded_at) => self.desired_state_updated_at > responded_at,
            None => true,
        }
    }

    /// Both sides agree the workspace is gone
    pub fn is_fully_terminated(&self) -> bool {
        self.desired_state == WorkspaceState::Terminated
            && self.actual_state == WorkspaceState::Terminated
    }
}

/// Parameters for creating a workspace
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWorkspaceParams {
    /// Owning agent
    pub agent_id: i64,

    /// Optional name, generated when absent
    pub name: Option<String>,

    /// Optional namespace, derived from the name when absent
    pub namespace: Option<String>,

    /// Processed devfile (YAML)
    pub processed_devfile: String,

    /// Initial desired state, `Running` when absent
    pub desired_state: Option<WorkspaceState>,

    /// Variables in declaration order
    #[serde(default)]
    pub variables: Vec<WorkspaceVariable>,
}
