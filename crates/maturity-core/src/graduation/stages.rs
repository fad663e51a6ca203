//! Individual exam stages.
//!
//! Each stage reduces collaborator output to a pass/fail verdict plus the
//! detail persisted in the exam record. Stage failures (collaborator
//! errors) are carried as values and count as unmet conditions.

use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use super::collaborators::{
    CollaboratorError, EdgeCaseSimulator, EpisodeSummary, ReadinessMetrics,
    SkillMasteryAssessment,
};
use crate::config::ExamConfig;
use crate::domain::{ExamStage, StageFailure};
use maturity_state::{
    ConstitutionalViolation, EdgeCaseLibrary, EdgeCaseRecord, EdgeCaseResult, MaturityLevel,
    ViolationKind, ViolationSeverity,
};

fn stage_failure(stage: ExamStage, err: &dyn std::fmt::Display) -> StageFailure {
    StageFailure {
        stage,
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReadinessStage {
    pub metrics: Option<ReadinessMetrics>,
    pub failure: Option<StageFailure>,
}

impl ReadinessStage {
    pub fn from_result(result: Result<ReadinessMetrics, CollaboratorError>) -> Self {
        match result.and_then(|metrics| metrics.validate().map(|()| metrics)) {
            Ok(metrics) => Self {
                metrics: Some(metrics),
                failure: None,
            },
            Err(err) => Self {
                metrics: None,
                failure: Some(stage_failure(ExamStage::Readiness, &err)),
            },
        }
    }

    pub fn unmet_reason(&self) -> Option<String> {
        if let Some(failure) = &self.failure {
            return Some(failure.to_string());
        }
        match &self.metrics {
            Some(m) if !m.threshold_met => Some(format!(
                "readiness threshold not met (score {:.2})",
                m.readiness_score
            )),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge cases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EdgeCaseStage {
    pub results: Vec<EdgeCaseResult>,
    pub failure: Option<StageFailure>,
}

impl EdgeCaseStage {
    pub fn total(&self) -> u32 {
        self.results.len() as u32
    }

    pub fn passed_count(&self) -> u32 {
        self.results.iter().filter(|r| r.passed).count() as u32
    }

    /// Vacuously true when no edge cases are configured.
    pub fn all_passed(&self) -> bool {
        self.failure.is_none() && self.results.iter().all(|r| r.passed)
    }

    pub fn unmet_reason(&self) -> Option<String> {
        if let Some(failure) = &self.failure {
            return Some(failure.to_string());
        }
        (!self.all_passed()).then(|| {
            format!(
                "edge cases failed ({}/{} passed)",
                self.passed_count(),
                self.total()
            )
        })
    }
}

async fn simulate_one(
    simulator: &dyn EdgeCaseSimulator,
    tenant_id: &str,
    agent_id: &str,
    case: &EdgeCaseRecord,
    timeout_ms: u64,
) -> EdgeCaseResult {
    let timeout = Duration::from_millis(timeout_ms);
    let outcome = match tokio::time::timeout(timeout, simulator.simulate(tenant_id, agent_id, case))
        .await
    {
        Ok(result) => result,
        Err(_elapsed) => Err(CollaboratorError::Timeout { timeout_ms }),
    };

    match outcome {
        Ok(outcome) => EdgeCaseResult {
            case_id: case.case_id.clone(),
            name: case.name.clone(),
            passed: outcome.passed,
            violations: outcome.violations,
            reason: outcome.reason,
        },
        Err(err) => {
            warn!(case_id = %case.case_id, error = %err, "edge case simulation failed");
            EdgeCaseResult {
                case_id: case.case_id.clone(),
                name: case.name.clone(),
                passed: false,
                violations: Vec::new(),
                reason: Some(err.to_string()),
            }
        }
    }
}

/// Replay active edge cases concurrently, each within its own time budget,
/// then record per-case statistics.
pub async fn run_edge_cases(
    library: &dyn EdgeCaseLibrary,
    simulator: &dyn EdgeCaseSimulator,
    tenant_id: &str,
    agent_id: &str,
    config: &ExamConfig,
) -> EdgeCaseStage {
    let cases = match library.list_active(tenant_id, config.edge_case_limit).await {
        Ok(cases) => cases,
        Err(err) => {
            return EdgeCaseStage {
                results: Vec::new(),
                failure: Some(stage_failure(ExamStage::EdgeCases, &err)),
            }
        }
    };
    debug!(count = cases.len(), "replaying edge cases");

    let results = join_all(cases.iter().map(|case| {
        simulate_one(
            simulator,
            tenant_id,
            agent_id,
            case,
            config.simulation_timeout_ms,
        )
    }))
    .await;

    let tested_at = Utc::now();
    for result in &results {
        if let Err(err) = library
            .record_test_result(&result.case_id, result.passed, tested_at)
            .await
        {
            warn!(case_id = %result.case_id, error = %err, "failed to record edge case statistics");
        }
    }

    EdgeCaseStage {
        results,
        failure: None,
    }
}

// ---------------------------------------------------------------------------
// Constitutional compliance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ConstitutionalStage {
    pub violations: Vec<ConstitutionalViolation>,
    pub failure: Option<StageFailure>,
}

impl ConstitutionalStage {
    pub fn from_result(
        result: Result<Vec<EpisodeSummary>, CollaboratorError>,
        config: &ExamConfig,
    ) -> Self {
        // One malformed episode fails the stage rather than passing as compliant.
        let checked = result.and_then(|episodes| {
            episodes.iter().try_for_each(EpisodeSummary::validate)?;
            Ok(episodes)
        });
        match checked {
            Ok(episodes) => Self {
                violations: scan_constitutional(&episodes, config),
                failure: None,
            },
            Err(err) => Self {
                violations: Vec::new(),
                failure: Some(stage_failure(ExamStage::Constitutional, &err)),
            },
        }
    }

    /// Episodes below the compliance threshold. Interventions do not count.
    pub fn low_score_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.kind == ViolationKind::LowScore)
            .count()
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none() && self.low_score_count() == 0
    }

    pub fn unmet_reason(&self, threshold: f64) -> Option<String> {
        if let Some(failure) = &self.failure {
            return Some(failure.to_string());
        }
        (!self.passed()).then(|| {
            format!(
                "constitutional violations ({} episodes below {:.2})",
                self.low_score_count(),
                threshold
            )
        })
    }
}

/// Flag episodes with low constitutional scores or human interventions.
pub fn scan_constitutional(
    episodes: &[EpisodeSummary],
    config: &ExamConfig,
) -> Vec<ConstitutionalViolation> {
    let mut violations = Vec::new();
    for episode in episodes {
        if episode.constitutional_score < config.constitutional_threshold {
            let severity = if episode.constitutional_score < config.high_severity_threshold {
                ViolationSeverity::High
            } else {
                ViolationSeverity::Medium
            };
            violations.push(ConstitutionalViolation {
                episode_id: episode.id.clone(),
                kind: ViolationKind::LowScore,
                severity,
                constitutional_score: episode.constitutional_score,
                intervention_count: episode.human_intervention_count,
                started_at: episode.started_at,
            });
        }
        if episode.human_intervention_count > 0 {
            violations.push(ConstitutionalViolation {
                episode_id: episode.id.clone(),
                kind: ViolationKind::HumanIntervention,
                severity: ViolationSeverity::Medium,
                constitutional_score: episode.constitutional_score,
                intervention_count: episode.human_intervention_count,
                started_at: episode.started_at,
            });
        }
    }
    violations
}

// ---------------------------------------------------------------------------
// Skill performance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SkillStage {
    pub assessment: Option<SkillMasteryAssessment>,
    /// Success-rate floor for the target level.
    pub min_success_rate: f64,
    pub failure: Option<StageFailure>,
}

impl SkillStage {
    pub fn from_result(
        result: Result<SkillMasteryAssessment, CollaboratorError>,
        target: MaturityLevel,
        config: &ExamConfig,
    ) -> Self {
        let min_success_rate = config.skill_success_minimums.for_level(target);
        match result.and_then(|assessment| assessment.validate().map(|()| assessment)) {
            Ok(assessment) => Self {
                assessment: Some(assessment),
                min_success_rate,
                failure: None,
            },
            Err(err) => Self {
                assessment: None,
                min_success_rate,
                failure: Some(stage_failure(ExamStage::Skill, &err)),
            },
        }
    }

    pub fn passed(&self, config: &ExamConfig) -> bool {
        match (&self.assessment, &self.failure) {
            (Some(a), None) => {
                a.mastery_score >= config.min_skill_mastery
                    && a.skills_used >= a.required_skills_for_level
                    && a.skill_success_rate >= self.min_success_rate
            }
            _ => false,
        }
    }

    pub fn unmet_reason(&self, config: &ExamConfig) -> Option<String> {
        if let Some(failure) = &self.failure {
            return Some(failure.to_string());
        }
        if self.passed(config) {
            return None;
        }
        self.assessment.as_ref().map(|a| {
            format!(
                "skill requirements not met (mastery {:.2}/{:.2}, skills {}/{}, success rate {:.2}/{:.2})",
                a.mastery_score,
                config.min_skill_mastery,
                a.skills_used,
                a.required_skills_for_level,
                a.skill_success_rate,
                self.min_success_rate
            )
        })
    }
}
