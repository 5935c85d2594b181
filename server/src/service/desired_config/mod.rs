//! Desired config generation
//!
//! Compiles one workspace snapshot into the ordered list of Kubernetes
//! resources the agent applies:
//!
//! 1. the workspace inventory, followed by the devfile workloads it owns
//! 2. the workspace NetworkPolicy, when the agent enforces network policies
//! 3. on full syncs only, the secrets inventory followed by the two secrets
//!
//! Generation is a pure function of the snapshot. An empty devfile
//! compilation short-circuits to an empty list so that a half-formed set never
//! reaches the agent's inventory.

pub mod context;
pub mod devfile;
pub mod inventory;
pub mod labels;
pub mod network_policy;
pub mod secrets;

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::domain::resource::Resource;
use crate::error::Result;

pub use context::WorkspaceReconcileContext;
pub use devfile::{CompileParams, DefaultDevfileCompiler, DevfileCompiler};

/// Suffix of the inventory that owns the workloads and network policy
pub const WORKSPACE_INVENTORY_SUFFIX: &str = "workspace";

/// Generates desired configs using a devfile compiler
#[derive(Clone)]
pub struct DesiredConfigGenerator {
    compiler: Arc<dyn DevfileCompiler>,
}

impl DesiredConfigGenerator {
    pub fn new(compiler: Arc<dyn DevfileCompiler>) -> Self {
        Self { compiler }
    }

    /// Generate the resources to apply for one workspace.
    ///
    /// `include_all_resources` adds the secrets; it is only set on full syncs
    /// so variable values are not resent on every poll. Errors are limited to
    /// manifests that fail to serialize.
    #[instrument(skip_all, fields(workspace = %ctx.name, include_all_resources = include_all_resources))]
    pub fn generate(
        &self,
        ctx: &WorkspaceReconcileContext,
        include_all_resources: bool,
    ) -> Result<Vec<Resource>> {
        let env_secret_name = secrets::env_secret_name(&ctx.name);
        let file_secret_name = secrets::file_secret_name(&ctx.name);
        let domain_template = ctx.domain_template();

        let inventory_name = inventory::inventory_name(&ctx.name, WORKSPACE_INVENTORY_SUFFIX);
        let common = labels::build(
            ctx.agent_id,
            &domain_template,
            &inventory_name,
            ctx.workspace_id,
        );

        let workloads = self.compiler.compile(&CompileParams {
            processed_devfile: ctx.processed_devfile.clone(),
            name: ctx.name.clone(),
            namespace: ctx.namespace.clone(),
            replicas: ctx.replicas(),
            domain_template,
            labels: common.labels.clone(),
            annotations: common.annotations.clone(),
            env_secret_names: vec![env_secret_name.clone()],
            file_secret_names: vec![file_secret_name.clone()],
        });

        if workloads.is_empty() {
            warn!(
                reason = "devfile_compilation_empty",
                "Devfile produced no resources, nothing will be applied"
            );
            return Ok(Vec::new());
        }

        let mut resources = Vec::with_capacity(workloads.len() + 5);
        resources.push(inventory::build(
            &inventory_name,
            &ctx.namespace,
            ctx.agent_id,
        )?);
        resources.extend(workloads);

        if ctx.network_policy_enabled {
            resources.push(network_policy::build(
                &ctx.name,
                &ctx.namespace,
                &common.labels,
                &common.annotations,
                &ctx.proxy_namespace,
            )?);
        }

        if include_all_resources {
            resources.extend(secrets::build_secrets(
                ctx,
                &env_secret_name,
                &file_secret_name,
            )?);
        }

        debug!(count = resources.len(), "Generated desired config");
        Ok(resources)
    }
}
