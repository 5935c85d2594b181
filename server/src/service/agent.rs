//! Agent service

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::agent::{Agent, CreateAgentParams};
use crate::error::{Error, Result};
use crate::infra::sqlite::AgentRepository;

/// Agent service for registration and authentication
pub struct AgentService {
    repository: Arc<AgentRepository>,
}

impl AgentService {
    /// Create a new agent service
    pub fn new(repository: Arc<AgentRepository>) -> Self {
        Self { repository }
    }

    /// Register an agent, returning the token it authenticates with
    pub async fn register(&self, params: CreateAgentParams) -> Result<(Agent, String)> {
        if params.name.trim().is_empty() {
            return Err(Error::InvalidParameter("agent name must not be empty".to_string()));
        }
        if params.dns_zone.trim().is_empty() {
            return Err(Error::InvalidParameter("dns_zone must not be empty".to_string()));
        }

        let (agent, token) = self.repository.create(params).await?;
        info!("Registered agent {} (id {})", agent.name, agent.id);
        Ok((agent, token))
    }

    /// Resolve the agent presenting a bearer token
    pub async fn authenticate(&self, token: &str) -> Result<Agent> {
        match self.repository.find_by_token(token).await? {
            Some(agent) => Ok(agent),
            None => {
                warn!("Rejected reconcile request with unknown agent token");
                Err(Error::Unauthorized("invalid agent token".to_string()))
            }
        }
    }

    /// List all agents
    pub async fn list(&self) -> Result<Vec<Agent>> {
        self.repository.list().await
    }
}
