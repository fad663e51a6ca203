//! SurrealDB connection setup
//!
//! Resolves where the governance database lives and returns a connected,
//! migrated `Surreal<Any>` client:
//! - `CloudConfig` (SURREALDB_ENDPOINT + credentials) for hosted instances
//! - `SURREALDB_URL` for any engine URL (`ws://`, `surrealkv://`, `mem://`)
//! - otherwise local persistence under `.maturity/db`

use crate::error::StateError;
use crate::migrations;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

/// Default namespace for governance data.
pub const DEFAULT_NAMESPACE: &str = "maturity";

/// Default database name.
pub const DEFAULT_DATABASE: &str = "main";

/// Directory used for local persistence when no remote is configured.
pub const DEFAULT_LOCAL_PATH: &str = ".maturity/db";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "maturity")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "maturity")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Connect to an engine URL, select the default namespace/database and
/// run migrations.
#[instrument]
pub async fn connect_url(url: &str) -> Result<Surreal<Any>> {
    if let Some(path) = url.strip_prefix("surrealkv://") {
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path, e
            ))
        })?;
    }

    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    db.use_ns(DEFAULT_NAMESPACE)
        .use_db(DEFAULT_DATABASE)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    info!("SurrealDB connected ({})", url);
    Ok(db)
}

/// Connect to SurrealDB Cloud and run migrations.
#[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
pub async fn connect_cloud(config: &CloudConfig) -> Result<Surreal<Any>> {
    info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
        })?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
    } else {
        db.signin(Database {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| {
            StateError::Connection(format!("Failed to select namespace/database: {}", e))
        })?;

    migrations::init_schema(&db).await?;
    info!("SurrealDB Cloud connected and schema initialized");
    Ok(db)
}

/// Connect using environment variables
///
/// If SURREALDB_ENDPOINT is set, connects to cloud.
/// If SURREALDB_URL is set, connects to that URL.
/// Otherwise, falls back to local persistence in `.maturity/db`.
pub async fn connect_from_env() -> Result<Surreal<Any>> {
    if let Ok(config) = CloudConfig::from_env() {
        return connect_cloud(&config).await;
    }

    if let Ok(url) = std::env::var("SURREALDB_URL") {
        return connect_url(&url).await;
    }

    let url = format!("surrealkv://{}", DEFAULT_LOCAL_PATH);
    info!(
        "No cloud config or SURREALDB_URL found, using local persistence: {}",
        url
    );
    connect_url(&url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_config_defaults() {
        let config = CloudConfig::new("wss://db.example", "svc", "secret");
        assert_eq!(config.namespace, "maturity");
        assert_eq!(config.database, "main");
        assert!(!config.is_root);

        let config = config.with_namespace("gov").with_database("prod").with_root(true);
        assert_eq!(config.namespace, "gov");
        assert_eq!(config.database, "prod");
        assert!(config.is_root);
    }
}
