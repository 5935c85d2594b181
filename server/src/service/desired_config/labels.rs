//! Ownership labels and annotations shared by every generated resource

use std::fmt::Display;

use crate::domain::resource::StringMap;

/// Label identifying the agent that applies the resource
pub const AGENT_ID_LABEL: &str = "agent.gitlab.com/id";

/// Annotation naming the inventory a resource belongs to
pub const OWNING_INVENTORY_ANNOTATION: &str = "config.k8s.io/owning-inventory";

/// Annotation carrying the hostname template expanded by the proxy
pub const HOST_TEMPLATE_ANNOTATION: &str = "workspaces.gitlab.com/host-template";

/// Annotation carrying the workspace identity
pub const WORKSPACE_ID_ANNOTATION: &str = "workspaces.gitlab.com/id";

/// Labels and annotations attached to a group of resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonMetadata {
    pub labels: StringMap,
    pub annotations: StringMap,
}

/// Build the canonical ownership labels and annotations.
///
/// Every value is rendered to a string, whatever the source type.
pub fn build(
    agent_id: impl Display,
    domain_template: &str,
    owning_inventory: &str,
    workspace_id: impl Display,
) -> CommonMetadata {
    let mut labels = StringMap::new();
    labels.insert(AGENT_ID_LABEL.to_string(), agent_id.to_string());

    let mut annotations = StringMap::new();
    annotations.insert(
        OWNING_INVENTORY_ANNOTATION.to_string(),
        owning_inventory.to_string(),
    );
    annotations.insert(
        HOST_TEMPLATE_ANNOTATION.to_string(),
        domain_template.to_string(),
    );
    annotations.insert(WORKSPACE_ID_ANNOTATION.to_string(), workspace_id.to_string());

    CommonMetadata {
        labels,
        annotations,
    }
}
