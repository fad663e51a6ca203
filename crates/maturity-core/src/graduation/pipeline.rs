//! Graduation exam orchestration.
//!
//! One exam run:
//! 1. load the agent; AUTONOMOUS short-circuits with `NoFurtherLevel`
//! 2. resolve the target, which is always the next rung
//! 3. run readiness, edge-case, constitutional and skill stages
//! 4. under the agent's write lock, re-load the agent and commit the exam
//!    record, the exam-owned agent fields and (on a pass) the AUTOMATIC
//!    ledger entry in one transaction
//!
//! Stages run without the lock, so score updates and manual status changes
//! are not blocked by a slow exam. A verdict whose starting level no longer
//! matches the stored status is recorded but not applied.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use super::collaborators::{EdgeCaseSimulator, EpisodeMetricsService};
use super::stages::{
    run_edge_cases, ConstitutionalStage, EdgeCaseStage, ReadinessStage, SkillStage,
};
use crate::cache::GovernanceCache;
use crate::config::ExamConfig;
use crate::domain::{Eligibility, ExamOutcome, ExamReport, Result, StageFailure};
use crate::locks::AgentLocks;
use crate::metrics::METRICS;
use crate::obs;
use maturity_state::{
    AgentRecord, EdgeCaseLibrary, ExamCommit, ExamRecord, GovernanceStore, MaturityLevel,
    PromotionHistoryEntry, PromotionType,
};

/// Stage verdicts gathered for one exam.
struct StageResults {
    readiness: ReadinessStage,
    edge_cases: EdgeCaseStage,
    constitutional: ConstitutionalStage,
    skill: SkillStage,
}

impl StageResults {
    /// Unmet conditions in fixed order: readiness, edge cases,
    /// constitutional, skill.
    fn unmet_reasons(&self, config: &ExamConfig) -> Vec<String> {
        [
            self.readiness.unmet_reason(),
            self.edge_cases.unmet_reason(),
            self.constitutional
                .unmet_reason(config.constitutional_threshold),
            self.skill.unmet_reason(config),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn failures(&self) -> Vec<StageFailure> {
        [
            &self.readiness.failure,
            &self.edge_cases.failure,
            &self.constitutional.failure,
            &self.skill.failure,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

/// Runs graduation exams against injected collaborators.
pub struct GraduationExamPipeline {
    store: Arc<dyn GovernanceStore>,
    edge_cases: Arc<dyn EdgeCaseLibrary>,
    metrics: Arc<dyn EpisodeMetricsService>,
    simulator: Arc<dyn EdgeCaseSimulator>,
    cache: Arc<GovernanceCache>,
    locks: Arc<AgentLocks>,
    config: ExamConfig,
}

impl GraduationExamPipeline {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        edge_cases: Arc<dyn EdgeCaseLibrary>,
        metrics: Arc<dyn EpisodeMetricsService>,
        simulator: Arc<dyn EdgeCaseSimulator>,
        cache: Arc<GovernanceCache>,
        locks: Arc<AgentLocks>,
        config: ExamConfig,
    ) -> Self {
        Self {
            store,
            edge_cases,
            metrics,
            simulator,
            cache,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &ExamConfig {
        &self.config
    }

    /// Whether `agent` may sit an exam at `now`.
    pub fn check_eligibility(&self, agent: &AgentRecord, now: DateTime<Utc>) -> Eligibility {
        let Some(target) = agent.status.next() else {
            return Eligibility::NoFurtherLevel;
        };
        match agent.exam_eligible_at {
            Some(until) if until > now => Eligibility::CoolingDown { until },
            _ => Eligibility::Eligible { target },
        }
    }

    /// Run an exam only if the agent is outside its cooldown window.
    pub async fn request_exam(
        &self,
        tenant_id: &str,
        agent_id: &str,
        target: Option<MaturityLevel>,
    ) -> Result<ExamOutcome> {
        let agent = self.store.get(tenant_id, agent_id).await?;
        match self.check_eligibility(&agent, Utc::now()) {
            Eligibility::CoolingDown { until } => Ok(ExamOutcome::Rejected {
                reason: format!("exam cooldown active until {}", until.to_rfc3339()),
            }),
            Eligibility::NoFurtherLevel | Eligibility::Eligible { .. } => {
                self.promote_via_exam(tenant_id, agent_id, target).await
            }
        }
    }

    /// Run a graduation exam now. Cooldown is not checked here.
    ///
    /// An exam promotes exactly one rung. An explicit `target` other than
    /// the next level is rejected without running any stage.
    ///
    /// Collaborator failures become stage failures on a FAILED exam;
    /// only an unknown agent or a storage failure is an error.
    pub async fn promote_via_exam(
        &self,
        tenant_id: &str,
        agent_id: &str,
        target: Option<MaturityLevel>,
    ) -> Result<ExamOutcome> {
        let agent = self.store.get(tenant_id, agent_id).await?;

        let Some(next) = agent.status.next() else {
            info!(agent_id = %agent_id, "agent already autonomous; no exam");
            return Ok(ExamOutcome::NoFurtherLevel {
                agent_id: agent.agent_id,
                current_level: agent.status,
            });
        };

        let target = target.unwrap_or(next);
        if target != next {
            return Ok(ExamOutcome::Rejected {
                reason: format!(
                    "target level {} is not the next level above {} (expected {})",
                    target, agent.status, next
                ),
            });
        }

        let exam_id = Uuid::new_v4();
        let span = obs::exam_span(&exam_id, tenant_id, agent_id);
        let report = self
            .run_stages_and_commit(agent, target, exam_id)
            .instrument(span)
            .await?;
        Ok(ExamOutcome::Completed(Box::new(report)))
    }

    async fn run_stages_and_commit(
        &self,
        agent: AgentRecord,
        target: MaturityLevel,
        exam_id: Uuid,
    ) -> Result<ExamReport> {
        let started_at = Utc::now();
        let clock = std::time::Instant::now();
        obs::emit_exam_started(&exam_id, agent.status, target);

        let stages = self.run_stages(&agent, target).await;
        for failure in stages.failures() {
            obs::emit_stage_failed(&exam_id, failure.stage, &failure.message);
        }

        let reasons = stages.unmet_reasons(&self.config);
        let passed = reasons.is_empty();
        let failure_reason = (!passed).then(|| reasons.join(", "));
        let completed_at = Utc::now();

        let mut record = build_record(
            exam_id,
            &agent,
            target,
            &stages,
            passed,
            failure_reason,
            started_at,
            completed_at,
        );

        let guard = self.locks.lock(&agent.tenant_id, &agent.agent_id).await;
        let mut updated = self.store.get(&agent.tenant_id, &agent.agent_id).await?;
        let status_unchanged = updated.status == agent.status;
        updated.last_exam_id = Some(exam_id);
        updated.updated_at = completed_at;

        let (promotion, cooldown_until) = if !passed {
            let until = completed_at + Duration::hours(self.config.cooldown_hours);
            updated.exam_eligible_at = Some(until);
            (None, Some(until))
        } else if status_unchanged {
            let entry = PromotionHistoryEntry::new(
                &updated,
                target,
                PromotionType::Automatic,
                completed_at,
            )
            .with_exam(exam_id, record.readiness_score);
            updated.status = target;
            updated.promotion_count += 1;
            updated.last_promotion_at = Some(completed_at);
            (Some(entry), None)
        } else {
            warn!(
                examined = %agent.status,
                stored = %updated.status,
                "status changed while the exam ran; promotion not applied"
            );
            (None, None)
        };
        record.promoted = promotion.is_some();

        self.cache.invalidate(&agent.tenant_id, &agent.agent_id);
        self.store
            .commit_exam(ExamCommit {
                exam: record.clone(),
                agent: updated.clone(),
                promotion: promotion.clone(),
            })
            .await?;
        self.cache.invalidate(&agent.tenant_id, &agent.agent_id);
        drop(guard);

        METRICS.record_exam(passed);
        obs::emit_exam_finished(
            &exam_id,
            passed,
            record.promoted,
            record.failure_reason.as_deref(),
            clock.elapsed().as_millis() as u64,
        );
        if let Some(entry) = &promotion {
            obs::emit_promotion_recorded(entry);
        }

        Ok(ExamReport {
            stage_failures: stages.failures(),
            record,
            new_status: updated.status,
            promotion,
            cooldown_until,
        })
    }

    /// Stages are independent, so they run concurrently.
    async fn run_stages(&self, agent: &AgentRecord, target: MaturityLevel) -> StageResults {
        let tenant_id = agent.tenant_id.as_str();
        let agent_id = agent.agent_id.as_str();
        let config = &self.config;

        let (readiness, edge_cases, episodes, skill) = tokio::join!(
            self.metrics
                .get_readiness(tenant_id, agent_id, config.episode_count, target),
            run_edge_cases(
                self.edge_cases.as_ref(),
                self.simulator.as_ref(),
                tenant_id,
                agent_id,
                config,
            ),
            self.metrics
                .get_recent_episodes(tenant_id, agent_id, config.episode_count),
            self.metrics.assess_skill_mastery(tenant_id, agent_id, target),
        );

        StageResults {
            readiness: ReadinessStage::from_result(readiness),
            edge_cases,
            constitutional: ConstitutionalStage::from_result(episodes, config),
            skill: SkillStage::from_result(skill, target, config),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    exam_id: Uuid,
    agent: &AgentRecord,
    target: MaturityLevel,
    stages: &StageResults,
    passed: bool,
    failure_reason: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> ExamRecord {
    let readiness = stages.readiness.metrics.as_ref();
    let skill = stages.skill.assessment.as_ref();

    ExamRecord {
        exam_id,
        agent_id: agent.agent_id.clone(),
        tenant_id: agent.tenant_id.clone(),
        current_level: agent.status,
        target_level: target,
        readiness_score: readiness.map(|m| m.readiness_score).unwrap_or(0.0),
        zero_intervention_ratio: readiness.map(|m| m.zero_intervention_ratio).unwrap_or(0.0),
        avg_constitutional_score: readiness.map(|m| m.avg_constitutional_score).unwrap_or(0.0),
        avg_confidence_score: readiness.map(|m| m.avg_confidence_score).unwrap_or(0.0),
        success_rate: readiness.map(|m| m.success_rate).unwrap_or(0.0),
        episodes_analyzed: readiness.map(|m| m.episodes_analyzed).unwrap_or(0),
        edge_cases_total: stages.edge_cases.total(),
        edge_cases_passed: stages.edge_cases.passed_count(),
        edge_case_results: stages.edge_cases.results.clone(),
        constitutional_violations: stages.constitutional.violations.clone(),
        skill_mastery_score: skill.map(|s| s.mastery_score).unwrap_or(0.0),
        skill_diversity: skill.map(|s| s.skill_diversity).unwrap_or(0.0),
        unique_skills_used: skill.map(|s| s.skills_used).unwrap_or(0),
        skill_execution_count: skill.map(|s| s.skill_execution_count).unwrap_or(0),
        skill_success_rate: skill.map(|s| s.skill_success_rate).unwrap_or(0.0),
        passed,
        failure_reason,
        promoted: false,
        started_at,
        completed_at,
    }
}
