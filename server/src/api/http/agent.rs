//! Agent HTTP handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::domain::agent::{Agent, CreateAgentParams};
use crate::{AppState, Result};

/// Agent response
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: i64,
    pub name: String,
    pub dns_zone: String,
    pub network_policy_enabled: bool,
    pub gitlab_workspaces_proxy_namespace: String,
    pub created_at: String,
    /// Only present in the registration response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            dns_zone: agent.config.dns_zone,
            network_policy_enabled: agent.config.network_policy_enabled,
            gitlab_workspaces_proxy_namespace: agent.config.gitlab_workspaces_proxy_namespace,
            created_at: agent.created_at.to_rfc3339(),
            token: None,
        }
    }
}

/// List agents response
#[derive(Debug, Serialize)]
pub struct ListAgentsResponse {
    pub agents: Vec<AgentResponse>,
    pub total: usize,
}

/// Register an agent
pub async fn register_agent(
    State(state): State<AppState>,
    Json(params): Json<CreateAgentParams>,
) -> Result<(StatusCode, Json<AgentResponse>)> {
    let (agent, token) = state.agent_service.register(params).await?;

    let mut response = AgentResponse::from(agent);
    response.token = Some(token);
    Ok((StatusCode::CREATED, Json(response)))
}

/// List all agents
pub async fn list_agents(State(state): State<AppState>) -> Result<Json<ListAgentsResponse>> {
    let agents = state.agent_service.list().await?;
    let total = agents.len();

    Ok(Json(ListAgentsResponse {
        agents: agents.into_iter().map(AgentResponse::from).collect(),
        total,
    }))
}
