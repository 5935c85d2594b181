//! Server configuration

use serde::Deserialize;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Database URL (SQLite)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Whether the remote development license is present
    #[serde(default = "default_licensed")]
    pub licensed: bool,

    /// Features switched on for this installation
    #[serde(default = "default_enabled_features")]
    pub enabled_features: Vec<String>,

    /// Agents (by name) for which features are switched off
    #[serde(default)]
    pub disabled_agents: Vec<String>,

    /// Log output format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite:data/workspaces.db?mode=rwc".to_string()
}

fn default_licensed() -> bool {
    true
}

fn default_enabled_features() -> Vec<String> {
    vec![crate::service::feature::REMOTE_DEVELOPMENT.to_string()]
}

fn default_log_format() -> String {
    "text".to_string()
}

fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        // Start with default config as base
        let mut config = Config::default();

        if let Ok(val) = std::env::var("WORKSPACE_HTTP_HOST") {
            config.http_host = val;
        }
        if let Ok(val) = std::env::var("WORKSPACE_HTTP_PORT") {
            config.http_port = val
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid WORKSPACE_HTTP_PORT {}: {}", val, e))?;
        }
        if let Ok(val) = std::env::var("WORKSPACE_DATABASE_URL") {
            config.database_url = val;
        }
        if let Ok(val) = std::env::var("WORKSPACE_LICENSED") {
            config.licensed = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Ok(val) = std::env::var("WORKSPACE_ENABLED_FEATURES") {
            config.enabled_features = parse_list(&val);
        }
        if let Ok(val) = std::env::var("WORKSPACE_DISABLED_AGENTS") {
            config.disabled_agents = parse_list(&val);
        }
        if let Ok(val) = std::env::var("WORKSPACE_LOG_FORMAT") {
            config.log_format = val;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            database_url: default_database_url(),
            licensed: default_licensed(),
            enabled_features: default_enabled_features(),
            disabled_agents: Vec::new(),
            log_format: default_log_format(),
        }
    }
}
