//! External collaborators consumed by the graduation exam.
//!
//! The exam never computes episode metrics or runs simulations itself;
//! it asks these services and only interprets their answers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maturity_state::{EdgeCaseRecord, MaturityLevel};

/// Failure reported by (or while calling) a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("collaborator timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Reject a payload carrying NaN or infinite scores.
fn require_finite(payload: &str, fields: &[(&str, f64)]) -> Result<(), CollaboratorError> {
    match fields.iter().find(|(_, value)| !value.is_finite()) {
        Some((name, value)) => Err(CollaboratorError::InvalidResponse(format!(
            "{payload} has non-finite {name} ({value})"
        ))),
        None => Ok(()),
    }
}

/// Aggregated readiness over the agent's recent episodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessMetrics {
    pub readiness_score: f64,
    pub threshold_met: bool,
    pub zero_intervention_ratio: f64,
    pub avg_constitutional_score: f64,
    pub avg_confidence_score: f64,
    pub success_rate: f64,
    pub episodes_analyzed: u32,
}

impl ReadinessMetrics {
    pub fn validate(&self) -> Result<(), CollaboratorError> {
        require_finite(
            "readiness metrics",
            &[
                ("readiness_score", self.readiness_score),
                ("zero_intervention_ratio", self.zero_intervention_ratio),
                ("avg_constitutional_score", self.avg_constitutional_score),
                ("avg_confidence_score", self.avg_confidence_score),
                ("success_rate", self.success_rate),
            ],
        )
    }
}

/// The slice of an episode the constitutional scan needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: String,
    pub constitutional_score: f64,
    #[serde(default)]
    pub human_intervention_count: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl EpisodeSummary {
    pub fn validate(&self) -> Result<(), CollaboratorError> {
        require_finite(
            &format!("episode {}", self.id),
            &[("constitutional_score", self.constitutional_score)],
        )
    }
}

/// Externally computed skill assessment for a target level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMasteryAssessment {
    pub mastery_score: f64,
    pub skill_diversity: f64,
    pub skills_used: u32,
    pub skill_execution_count: u64,
    pub skill_success_rate: f64,
    pub required_skills_for_level: u32,
}

impl SkillMasteryAssessment {
    pub fn validate(&self) -> Result<(), CollaboratorError> {
        require_finite(
            "skill assessment",
            &[
                ("mastery_score", self.mastery_score),
                ("skill_diversity", self.skill_diversity),
                ("skill_success_rate", self.skill_success_rate),
            ],
        )
    }
}

/// Result of replaying one edge case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutcome {
    pub passed: bool,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[async_trait]
pub trait EpisodeMetricsService: Send + Sync {
    async fn get_readiness(
        &self,
        tenant_id: &str,
        agent_id: &str,
        episode_count: usize,
        target_level: MaturityLevel,
    ) -> Result<ReadinessMetrics, CollaboratorError>;

    /// Most recent episodes first, at most `limit`.
    async fn get_recent_episodes(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<EpisodeSummary>, CollaboratorError>;

    async fn assess_skill_mastery(
        &self,
        tenant_id: &str,
        agent_id: &str,
        target_level: MaturityLevel,
    ) -> Result<SkillMasteryAssessment, CollaboratorError>;
}

#[async_trait]
pub trait EdgeCaseSimulator: Send + Sync {
    async fn simulate(
        &self,
        tenant_id: &str,
        agent_id: &str,
        edge_case: &EdgeCaseRecord,
    ) -> Result<SimulationOutcome, CollaboratorError>;
}
