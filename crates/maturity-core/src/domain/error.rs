//! Error taxonomy for the governance engine.
//!
//! Only unexpected conditions are errors. Denials, failed exams and
//! rejected admin requests are ordinary result values.

use maturity_state::StorageError;

/// Governance engine errors.
#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    #[error("agent not found: {agent_id} (tenant {tenant_id})")]
    AgentNotFound { tenant_id: String, agent_id: String },

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("invalid governance config: {0}")]
    InvalidConfig(String),
}

impl From<StorageError> for GovernanceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AgentNotFound {
                tenant_id,
                agent_id,
            } => GovernanceError::AgentNotFound {
                tenant_id,
                agent_id,
            },
            other => GovernanceError::Storage(other),
        }
    }
}

/// Result type for governance operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_not_found_lifts_to_agent_not_found() {
        let err: GovernanceError = StorageError::AgentNotFound {
            tenant_id: "acme".into(),
            agent_id: "agent-9".into(),
        }
        .into();
        assert!(matches!(err, GovernanceError::AgentNotFound { .. }));
        assert!(err.to_string().contains("agent-9"));
    }

    #[test]
    fn backend_failure_stays_storage() {
        let err: GovernanceError = StorageError::Backend("connection reset".into()).into();
        assert!(matches!(err, GovernanceError::Storage(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn invalid_config_display() {
        let err = GovernanceError::InvalidConfig("delta out of range".into());
        assert!(err.to_string().contains("invalid governance config"));
    }
}
