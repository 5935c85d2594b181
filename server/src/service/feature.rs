//! Feature and license gating
//!
//! Checked once per request at the protocol boundary, never inside the
//! desired config generator.

#[cfg(test)]
use mockall::automock;

use crate::Config;

/// Feature guarding the reconcile protocol
pub const REMOTE_DEVELOPMENT: &str = "remote_development";

/// Capability check evaluated per request
#[cfg_attr(test, automock)]
pub trait FeatureGate: Send + Sync {
    /// Whether `feature` is available for `scope` (an agent name)
    fn is_enabled(&self, feature: &str, scope: &str) -> bool;
}

/// Feature gate driven by the server configuration
#[derive(Debug, Clone)]
pub struct ConfigFeatureGate {
    licensed: bool,
    enabled_features: Vec<String>,
    disabled_scopes: Vec<String>,
}

impl ConfigFeatureGate {
    pub fn new(config: &Config) -> Self {
        Self {
            licensed: config.licensed,
            enabled_features: config.enabled_features.clone(),
            disabled_scopes: config.disabled_agents.clone(),
        }
    }
}

impl FeatureGate for ConfigFeatureGate {
    fn is_enabled(&self, feature: &str, scope: &str) -> bool {
        self.licensed
            && self.enabled_features.iter().any(|f| f == feature)
            && !self.disabled_scopes.iter().any(|s| s == scope)
    }
}
