//! Configuration management for Tessera services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (TESSERA_ prefix, `__` section separator)
//! 2. Config file (tessera.toml)
//! 3. Defaults

use serde::Deserialize;

use crate::error::CoreError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TesseraConfig {
    #[serde(default)]
    pub graph: GraphSettings,

    #[serde(default)]
    pub neo4j: Neo4jSettings,
}

/// Graph snapshot and store policy.
///
/// Loaded from the `[graph]` section or `TESSERA_GRAPH__*` variables.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GraphSettings {
    /// Node budget used when a request does not set one.
    #[serde(default = "default_limit_nodes")]
    pub default_limit_nodes: usize,

    /// Edge budget used when a request does not set one.
    #[serde(default = "default_limit_edges")]
    pub default_limit_edges: usize,

    /// Deepest neighborhood traversal a request may ask for.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Whether a relationship may point from an entity to itself.
    #[serde(default)]
    pub allow_self_relationships: bool,

    /// Frontier nodes whose relationships are fetched concurrently.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Wall-clock limit for a single snapshot request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Connection settings for the Neo4j store.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_limit_nodes() -> usize {
    10_000
}

fn default_limit_edges() -> usize {
    20_000
}

fn default_max_depth() -> u32 {
    3
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_request_timeout() -> u64 {
    30
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "tessera-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            default_limit_nodes: default_limit_nodes(),
            default_limit_edges: default_limit_edges(),
            max_depth: default_max_depth(),
            allow_self_relationships: false,
            fetch_concurrency: default_fetch_concurrency(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl TesseraConfig {
    /// Load configuration from `<file_prefix>.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self, CoreError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("TESSERA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: TesseraConfig = cfg.try_deserialize()?;
        tracing::debug!(
            file = file_prefix,
            default_limit_nodes = loaded.graph.default_limit_nodes,
            default_limit_edges = loaded.graph.default_limit_edges,
            max_depth = loaded.graph.max_depth,
            "Loaded configuration"
        );
        Ok(loaded)
    }
}
