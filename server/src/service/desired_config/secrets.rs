//! Secrets carrying workspace variables
//!
//! Variables are split by type: environment variables are injected through
//! `envFrom`, file variables through a mounted secret volume. Both secrets are
//! always emitted, even when empty, so the resource set keeps a stable shape
//! across reconciles.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

use super::context::WorkspaceReconcileContext;
use super::{inventory, labels};
use crate::domain::resource::{ObjectMeta, Resource};
use crate::domain::workspace::{VariableType, WorkspaceVariable};
use crate::error::Result;

/// Suffix of the inventory that owns the secrets
pub const SECRETS_INVENTORY_SUFFIX: &str = "secrets";

/// Name of the secret holding environment variables
pub fn env_secret_name(workspace_name: &str) -> String {
    format!("{}-env-var", workspace_name)
}

/// Name of the secret holding file variables
pub fn file_secret_name(workspace_name: &str) -> String {
    format!("{}-file", workspace_name)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Secret {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    data: BTreeMap<String, String>,
}

/// Build `[inventory, env secret, file secret]` for a workspace.
pub fn build_secrets(
    ctx: &WorkspaceReconcileContext,
    env_secret_name: &str,
    file_secret_name: &str,
) -> Result<Vec<Resource>> {
    let inventory_name = inventory::inventory_name(&ctx.name, SECRETS_INVENTORY_SUFFIX);
    let common = labels::build(
        ctx.agent_id,
        &ctx.domain_template(),
        &inventory_name,
        ctx.workspace_id,
    );

    let env_data = encoded_data(&ctx.variables, VariableType::Environment);
    let file_data = encoded_data(&ctx.variables, VariableType::File);

    let env_secret = Secret {
        api_version: "v1",
        kind: "Secret",
        metadata: ObjectMeta::new(
            env_secret_name,
            &ctx.namespace,
            &common.labels,
            &common.annotations,
        ),
        data: env_data,
    };
    let file_secret = Secret {
        api_version: "v1",
        kind: "Secret",
        metadata: ObjectMeta::new(
            file_secret_name,
            &ctx.namespace,
            &common.labels,
            &common.annotations,
        ),
        data: file_data,
    };

    Ok(vec![
        inventory::build(&inventory_name, &ctx.namespace, ctx.agent_id)?,
        Resource::from_manifest(&env_secret)?,
        Resource::from_manifest(&file_secret)?,
    ])
}

/// Fold the variables of one type into a key -> base64 value map.
/// A later variable with the same key replaces an earlier one.
fn encoded_data(
    variables: &[WorkspaceVariable],
    variable_type: VariableType,
) -> BTreeMap<String, String> {
    variables
        .iter()
        .filter(|v| v.variable_type == variable_type)
        .map(|v| (v.key.clone(), STANDARD.encode(v.value.as_bytes())))
        .collect()
}
