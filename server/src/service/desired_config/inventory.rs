//! Inventory marker resources
//!
//! The apply tool on the agent side groups applied objects by the inventory
//! `ConfigMap` named in their `owning-inventory` annotation and prunes members
//! that disappear from a later apply.

use serde::Serialize;

use super::labels::AGENT_ID_LABEL;
use crate::domain::resource::{ObjectMeta, Resource, StringMap};
use crate::error::Result;

/// Label the apply tool uses to find an inventory object
pub const INVENTORY_ID_LABEL: &str = "cli-utils.sigs.k8s.io/inventory-id";

/// Name of a workspace's inventory with the given suffix
pub fn inventory_name(workspace_name: &str, suffix: &str) -> String {
    format!("{}-{}-inventory", workspace_name, suffix)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InventoryConfigMap {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
}

/// Build the inventory `ConfigMap` for one group of resources.
///
/// The inventory itself only carries the agent label; it is not owned by any
/// inventory.
pub fn build(name: &str, namespace: &str, agent_id: i64) -> Result<Resource> {
    let mut labels = StringMap::new();
    labels.insert(AGENT_ID_LABEL.to_string(), agent_id.to_string());
    labels.insert(INVENTORY_ID_LABEL.to_string(), name.to_string());

    Resource::from_manifest(&InventoryConfigMap {
        api_version: "v1",
        kind: "ConfigMap",
        metadata: ObjectMeta::new(name, namespace, &labels, &StringMap::new()),
    })
}
