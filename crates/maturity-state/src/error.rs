//! Error types for maturity-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors returned by the storage traits.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No agent with this id is registered for the tenant.
    #[error("agent not found: {agent_id} (tenant {tenant_id})")]
    AgentNotFound { tenant_id: String, agent_id: String },

    /// Registration of an agent id that already exists for the tenant.
    #[error("agent already registered: {agent_id} (tenant {tenant_id})")]
    AgentExists { tenant_id: String, agent_id: String },

    #[error("exam not found: {exam_id}")]
    ExamNotFound { exam_id: String },

    #[error("edge case not found: {case_id}")]
    EdgeCaseNotFound { case_id: String },

    /// A stored value could not be mapped back into a record type.
    #[error("corrupt record in {table}: {reason}")]
    CorruptRecord { table: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Backend (database) failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_not_found_names_both_ids() {
        let err = StorageError::AgentNotFound {
            tenant_id: "acme".into(),
            agent_id: "agent-7".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("agent-7"));
        assert!(msg.contains("acme"));
    }

    #[test]
    fn serde_error_maps_to_serialization() {
        let raw = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StorageError = raw.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
