//! Maturity Core Library
//!
//! Governance engine for autonomous agents: maturity-gated permission
//! decisions, confidence scoring, a coherent decision cache and the
//! graduation exam pipeline with its promotion ledger.
//!
//! [`GovernanceEngine`] wires every component to one store and one cache.

pub mod cache;
pub mod confidence;
pub mod config;
pub mod domain;
pub mod graduation;
pub mod locks;
pub mod metrics;
pub mod obs;
pub mod policy;
pub mod promotion;
pub mod telemetry;

use std::sync::Arc;

pub use cache::{CacheKey, CacheStats, GovernanceCache};
pub use confidence::{
    apply_delta, derive_status_for_display, ConfidenceScoreEngine, Impact, ScoreUpdate,
};
pub use config::{CacheConfig, ExamConfig, GovernanceConfig, ScoreConfig, SkillSuccessMinimums};
pub use domain::{
    classify, ActionComplexity, ActionRequired, AgentCapabilities, Eligibility, EnforcementResult,
    EnforcementStatus, ExamOutcome, ExamReport, ExamStage, GovernanceDecision, GovernanceError,
    Result, StageFailure, StatusChangeOutcome, ACTION_VOCABULARY,
};
pub use graduation::{
    CollaboratorError, EdgeCaseSimulator, EpisodeMetricsService, EpisodeSummary,
    FixtureCollaborators, GraduationExamPipeline, ReadinessMetrics, SimulationOutcome, SkillMasteryAssessment,
};
pub use locks::{AgentGuard, AgentLocks};
pub use policy::{capabilities_for, decide, PermissionPolicy, ADMIN_ROLES};
pub use promotion::{PromotionService, PromotionSummary};

pub use maturity_state::{
    AgentRecord, EdgeCaseRecord, ExamRecord, MaturityLevel, PromotionHistoryEntry, PromotionType,
    UserRecord,
};

use maturity_state::{EdgeCaseLibrary, GovernanceStore, UserDirectory};

/// All governance components sharing one store, one decision cache and
/// one set of per-agent write locks.
pub struct GovernanceEngine<S> {
    store: Arc<S>,
    cache: Arc<GovernanceCache>,
    locks: Arc<AgentLocks>,
    config: GovernanceConfig,
    pub policy: PermissionPolicy,
    pub confidence: ConfidenceScoreEngine,
    pub promotions: PromotionService,
}

impl<S> GovernanceEngine<S>
where
    S: GovernanceStore + EdgeCaseLibrary + UserDirectory + 'static,
{
    /// Build the engine after validating `config`.
    pub fn new(store: Arc<S>, config: GovernanceConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(GovernanceCache::new(&config.cache));
        let locks = Arc::new(AgentLocks::new());

        let policy = PermissionPolicy::new(store.clone(), store.clone(), cache.clone());
        let confidence = ConfidenceScoreEngine::new(
            store.clone(),
            cache.clone(),
            locks.clone(),
            config.score.clone(),
        );
        let promotions = PromotionService::new(store.clone(), cache.clone(), locks.clone());

        Ok(Self {
            store,
            cache,
            locks,
            config,
            policy,
            confidence,
            promotions,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<GovernanceCache> {
        &self.cache
    }

    pub fn locks(&self) -> &Arc<AgentLocks> {
        &self.locks
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    /// Exam pipeline over this engine's store and cache, using the given
    /// episode metrics and simulation collaborators.
    pub fn exam_pipeline(
        &self,
        metrics: Arc<dyn EpisodeMetricsService>,
        simulator: Arc<dyn EdgeCaseSimulator>,
    ) -> GraduationExamPipeline {
        GraduationExamPipeline::new(
            self.store.clone(),
            self.store.clone(),
            metrics,
            simulator,
            self.cache.clone(),
            self.locks.clone(),
            self.config.exam.clone(),
        )
    }
}
