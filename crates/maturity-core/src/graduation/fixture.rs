//! Scripted collaborators loaded from JSON.
//!
//! `FixtureCollaborators` answers every collaborator call from canned data.
//! The admin CLI uses it to run exams offline; tests use it to script
//! stage outcomes. A missing answer behaves like an unavailable service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::collaborators::{
    CollaboratorError, EdgeCaseSimulator, EpisodeMetricsService, EpisodeSummary,
    ReadinessMetrics, SimulationOutcome, SkillMasteryAssessment,
};
use maturity_state::{EdgeCaseRecord, MaturityLevel};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureCollaborators {
    pub readiness: Option<ReadinessMetrics>,
    /// `None` makes the episode lookup fail.
    pub episodes: Option<Vec<EpisodeSummary>>,
    pub skill: Option<SkillMasteryAssessment>,
    /// Outcome per edge case id.
    pub simulations: HashMap<String, SimulationOutcome>,
    /// Outcome for cases not listed in `simulations`.
    pub default_simulation: Option<SimulationOutcome>,
    /// Artificial latency added to every simulation.
    pub simulation_delay_ms: u64,
}

impl FixtureCollaborators {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Collaborators under which every stage passes.
    pub fn passing() -> Self {
        Self {
            readiness: Some(ReadinessMetrics {
                readiness_score: 0.85,
                threshold_met: true,
                zero_intervention_ratio: 0.9,
                avg_constitutional_score: 0.98,
                avg_confidence_score: 0.8,
                success_rate: 0.92,
                episodes_analyzed: 30,
            }),
            episodes: Some(Vec::new()),
            skill: Some(SkillMasteryAssessment {
                mastery_score: 0.7,
                skill_diversity: 0.5,
                skills_used: 6,
                skill_execution_count: 120,
                skill_success_rate: 0.9,
                required_skills_for_level: 3,
            }),
            simulations: HashMap::new(),
            default_simulation: Some(SimulationOutcome {
                passed: true,
                violations: Vec::new(),
                reason: None,
            }),
            simulation_delay_ms: 0,
        }
    }

    pub fn with_episodes(mut self, episodes: Vec<EpisodeSummary>) -> Self {
        self.episodes = Some(episodes);
        self
    }

    pub fn with_simulation(mut self, case_id: impl Into<String>, outcome: SimulationOutcome) -> Self {
        self.simulations.insert(case_id.into(), outcome);
        self
    }

    pub fn with_simulation_delay(mut self, delay_ms: u64) -> Self {
        self.simulation_delay_ms = delay_ms;
        self
    }
}

fn missing(what: &str) -> CollaboratorError {
    CollaboratorError::Unavailable(format!("no fixture data for {what}"))
}

#[async_trait]
impl EpisodeMetricsService for FixtureCollaborators {
    async fn get_readiness(
        &self,
        _tenant_id: &str,
        _agent_id: &str,
        _episode_count: usize,
        _target_level: MaturityLevel,
    ) -> Result<ReadinessMetrics, CollaboratorError> {
        self.readiness.clone().ok_or_else(|| missing("readiness"))
    }

    async fn get_recent_episodes(
        &self,
        _tenant_id: &str,
        _agent_id: &str,
        limit: usize,
    ) -> Result<Vec<EpisodeSummary>, CollaboratorError> {
        let episodes = self.episodes.as_ref().ok_or_else(|| missing("episodes"))?;
        Ok(episodes.iter().take(limit).cloned().collect())
    }

    async fn assess_skill_mastery(
        &self,
        _tenant_id: &str,
        _agent_id: &str,
        _target_level: MaturityLevel,
    ) -> Result<SkillMasteryAssessment, CollaboratorError> {
        self.skill.clone().ok_or_else(|| missing("skill mastery"))
    }
}

#[async_trait]
impl EdgeCaseSimulator for FixtureCollaborators {
    async fn simulate(
        &self,
        _tenant_id: &str,
        _agent_id: &str,
        edge_case: &EdgeCaseRecord,
    ) -> Result<SimulationOutcome, CollaboratorError> {
        if self.simulation_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.simulation_delay_ms)).await;
        }
        self.simulations
            .get(&edge_case.case_id)
            .or(self.default_simulation.as_ref())
            .cloned()
            .ok_or_else(|| missing(&format!("edge case {}", edge_case.case_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_json() {
        let fixture = FixtureCollaborators::from_json(
            r#"{
                "episodes": [{"id": "ep-1", "constitutional_score": 0.97}],
                "default_simulation": {"passed": true}
            }"#,
        )
        .unwrap();
        assert!(fixture.readiness.is_none());
        assert_eq!(fixture.episodes.as_ref().map(Vec::len), Some(1));
        assert_eq!(fixture.simulation_delay_ms, 0);
    }

    #[tokio::test]
    async fn missing_data_is_unavailable() {
        let fixture = FixtureCollaborators::default();
        let err = fixture
            .get_readiness("acme", "a1", 30, MaturityLevel::Intern)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn per_case_outcome_overrides_default() {
        let fixture = FixtureCollaborators::passing().with_simulation(
            "ec-2",
            SimulationOutcome {
                passed: false,
                violations: vec!["leaked pii".into()],
                reason: None,
            },
        );
        let ok = EdgeCaseRecord::new("ec-1", "one", "pii", None);
        let bad = EdgeCaseRecord::new("ec-2", "two", "pii", None);
        assert!(fixture.simulate("acme", "a1", &ok).await.unwrap().passed);
        assert!(!fixture.simulate("acme", "a1", &bad).await.unwrap().passed);
    }
}
