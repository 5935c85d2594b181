//! Workspace repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use crate::domain::workspace::{VariableType, Workspace, WorkspaceState, WorkspaceVariable};
use crate::error::{Error, Result};

/// Database row for workspace
#[derive(Debug, FromRow)]
struct WorkspaceRow {
    id: i64,
    name: String,
    namespace: String,
    agent_id: i64,
    desired_state: String,
    desired_state_updated_at: String,
    actual_state: String,
    deployment_resource_version: Option<String>,
    responded_to_agent_at: Option<String>,
    processed_devfile: String,
    dns_zone: String,
    created_at: String,
    updated_at: String,
}

/// Database row for workspace variable
#[derive(Debug, FromRow)]
struct VariableRow {
    key: String,
    value: String,
    variable_type: String,
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn parse_state(field: &str, value: &str) -> Result<WorkspaceState> {
    WorkspaceState::from_str(value)
        .ok_or_else(|| Error::Internal(format!("Invalid {}: {}", field, value)))
}

impl WorkspaceRow {
    fn into_workspace(self, variables: Vec<WorkspaceVariable>) -> Result<Workspace> {
        Ok(Workspace {
            id: self.id,
            desired_state: parse_state("desired_state", &self.desired_state)?,
            desired_state_updated_at: parse_timestamp(
                "desired_state_updated_at",
                &self.desired_state_updated_at,
            )?,
            actual_state: parse_state("actual_state", &self.actual_state)?,
            responded_to_agent_at: self
                .responded_to_agent_at
                .as_deref()
                .map(|t| parse_timestamp("responded_to_agent_at", t))
                .transpose()?,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            updated_at: parse_timestamp("updated_at", &self.updated_at)?,
            name: self.name,
            namespace: self.namespace,
            agent_id: self.agent_id,
            deployment_resource_version: self.deployment_resource_version,
            processed_devfile: self.processed_devfile,
            dns_zone: self.dns_zone,
            variables,
        })
    }
}

impl TryFrom<VariableRow> for WorkspaceVariable {
    type Error = Error;

    fn try_from(row: VariableRow) -> Result<Self> {
        let variable_type = VariableType::from_str(&row.variable_type).ok_or_else(|| {
            Error::Internal(format!("Invalid variable type: {}", row.variable_type))
        })?;

        Ok(WorkspaceVariable {
            key: row.key,
            value: row.value,
            variable_type,
        })
    }
}

/// A fully resolved workspace ready to be stored
#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub name: String,
    pub namespace: String,
    pub agent_id: i64,
    pub desired_state: WorkspaceState,
    pub actual_state: WorkspaceState,
    pub processed_devfile: String,
    pub dns_zone: String,
    pub variables: Vec<WorkspaceVariable>,
}

const WORKSPACE_COLUMNS: &str = "id, name, namespace, agent_id, desired_state, \
    desired_state_updated_at, actual_state, deployment_resource_version, \
    responded_to_agent_at, processed_devfile, dns_zone, created_at, updated_at";

/// Workspace repository for database operations
pub struct WorkspaceRepository {
    pool: SqlitePool,
}

impl WorkspaceRepository {
    /// Create a new repository with the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new workspace together with its variables
    pub async fn create(&self, new: NewWorkspace) -> Result<Workspace> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO workspaces (name, namespace, agent_id, desired_state, desired_state_updated_at,
                                    actual_state, processed_devfile, dns_zone, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.namespace)
        .bind(new.agent_id)
        .bind(new.desired_state.as_str())
        .bind(&now)
        .bind(new.actual_state.as_str())
        .bind(&new.processed_devfile)
        .bind(&new.dns_zone)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::WorkspaceAlreadyExists(new.name.clone())
            }
            other => other.into(),
        })?;
        let id = result.last_insert_rowid();

        for variable in &new.variables {
            sqlx::query(
                r#"
                INSERT INTO workspace_variables (workspace_id, key, value, variable_type)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(id)
            .bind(&variable.key)
            .bind(&variable.value)
            .bind(variable.variable_type.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.get(id).await
    }

    /// Get a workspace by ID
    pub async fn get(&self, id: i64) -> Result<Workspace> {
        let row: WorkspaceRow = sqlx::query_as(&format!(
            "SELECT {} FROM workspaces WHERE id = ?",
            WORKSPACE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::WorkspaceNotFound(id.to_string()))?;

        self.hydrate(row).await
    }

    /// Find a workspace of an agent by name
    pub async fn find_by_name(&self, agent_id: i64, name: &str) -> Result<Option<Workspace>> {
        let row: Option<WorkspaceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM workspaces WHERE agent_id = ? AND name = ?",
            WORKSPACE_COLUMNS
        ))
        .bind(agent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// List all workspaces
    pub async fn list(&self) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM workspaces ORDER BY id",
            WORKSPACE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    /// List the workspaces of one agent
    pub async fn list_for_agent(&self, agent_id: i64) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM workspaces WHERE agent_id = ? ORDER BY id",
            WORKSPACE_COLUMNS
        ))
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    /// Set a new desired state
    pub async fn update_desired_state(&self, id: i64, state: WorkspaceState) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET desired_state = ?, desired_state_updated_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::WorkspaceNotFound(id.to_string()));
        }

        Ok(())
    }

    /// Record the state the agent observed
    pub async fn update_actual_state(
        &self,
        id: i64,
        state: WorkspaceState,
        resource_version: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET actual_state = ?, deployment_resource_version = COALESCE(?, deployment_resource_version),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(state.as_str())
        .bind(resource_version)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::WorkspaceNotFound(id.to_string()));
        }

        Ok(())
    }

    /// Record that the workspaces were included in a reconcile response
    pub async fn mark_responded(&self, ids: &[i64], at: DateTime<Utc>) -> Result<()> {
        let at = at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for id in ids {
            sqlx::query("UPDATE workspaces SET responded_to_agent_at = ? WHERE id = ?")
                .bind(&at)
                .bind(*id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn hydrate(&self, row: WorkspaceRow) -> Result<Workspace> {
        let variables: Vec<VariableRow> = sqlx::query_as(
            r#"
            SELECT key, value, variable_type
            FROM workspace_variables
            WHERE workspace_id = ?
            ORDER BY id
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let variables = variables
            .into_iter()
            .map(WorkspaceVariable::try_from)
            .collect::<Result<Vec<_>>>()?;

        row.into_workspace(variables)
    }

    async fn hydrate_all(&self, rows: Vec<WorkspaceRow>) -> Result<Vec<Workspace>> {
        let mut workspaces = Vec::with_capacity(rows.len());
        for row in rows {
            workspaces.push(self.hydrate(row).await?);
        }
        Ok(workspaces)
    }
}
