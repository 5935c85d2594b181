//! SQLite database layer

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use uuid::Uuid;

use crate::domain::agent::{Agent, CreateAgentParams, RemoteDevelopmentAgentConfig};
use crate::error::{Error, Result};

/// Initialize the database connection pool
pub async fn init(database_url: &str) -> anyhow::Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        if let Some(path) = path.split('?').next() {
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Enable WAL mode for better concurrent performance
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Database row for agent
#[derive(Debug, FromRow)]
struct AgentRow {
    id: i64,
    name: String,
    dns_zone: String,
    network_policy_enabled: bool,
    gitlab_workspaces_proxy_namespace: String,
    created_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = Error;

    fn try_from(row: AgentRow) -> Result<Self> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Agent {
            id: row.id,
            name: row.name,
            config: RemoteDevelopmentAgentConfig {
                dns_zone: row.dns_zone,
                network_policy_enabled: row.network_policy_enabled,
                gitlab_workspaces_proxy_namespace: row.gitlab_workspaces_proxy_namespace,
            },
            created_at,
        })
    }
}

const AGENT_COLUMNS: &str =
    "id, name, dns_zone, network_policy_enabled, gitlab_workspaces_proxy_namespace, created_at";

/// Agent repository for database operations
pub struct AgentRepository {
    pool: SqlitePool,
}

impl AgentRepository {
    /// Create a new repository with the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register an agent, returning it with its freshly issued token
    pub async fn create(&self, params: CreateAgentParams) -> Result<(Agent, String)> {
        let token = format!("glagent-{}", Uuid::new_v4().simple());
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO agents (name, token, dns_zone, network_policy_enabled, gitlab_workspaces_proxy_namespace, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&params.name)
        .bind(&token)
        .bind(&params.dns_zone)
        .bind(params.network_policy_enabled)
        .bind(&params.gitlab_workspaces_proxy_namespace)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::AgentAlreadyExists(params.name.clone())
            }
            other => other.into(),
        })?;

        let agent = self.get(result.last_insert_rowid()).await?;
        Ok((agent, token))
    }

    /// Get an agent by ID
    pub async fn get(&self, id: i64) -> Result<Agent> {
        let row: AgentRow = sqlx::query_as(&format!(
            "SELECT {} FROM agents WHERE id = ?",
            AGENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::AgentNotFound(id.to_string()))?;

        row.try_into()
    }

    /// Find the agent owning a bearer token
    pub async fn find_by_token(&self, token: &str) -> Result<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agents WHERE token = ?",
            AGENT_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Agent::try_from).transpose()
    }

    /// List all agents
    pub async fn list(&self) -> Result<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            "SELECT {} FROM agents ORDER BY id",
            AGENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }
}
