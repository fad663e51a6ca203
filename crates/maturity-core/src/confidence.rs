//! Confidence score engine.
//!
//! [`apply_delta`] and [`derive_status_for_display`] are pure.
//! [`ConfidenceScoreEngine`] wraps them with persistence and cache
//! invalidation.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::cache::GovernanceCache;
use crate::config::ScoreConfig;
use crate::domain::Result;
use crate::locks::AgentLocks;
use crate::metrics::METRICS;
use crate::obs;
use maturity_state::{clamp_score, AgentRecordStore, MaturityLevel};

/// Magnitude class of a piece of feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    High,
}

impl std::str::FromStr for Impact {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "high" => Ok(Self::High),
            other => Err(format!("unknown impact '{other}' (expected low or high)")),
        }
    }
}

/// Signed delta for one feedback event.
pub fn delta_for(positive: bool, impact: Impact, config: &ScoreConfig) -> f64 {
    match (positive, impact) {
        (true, Impact::Low) => config.positive_low,
        (true, Impact::High) => config.positive_high,
        (false, Impact::Low) => -config.negative_low,
        (false, Impact::High) => -config.negative_high,
    }
}

/// Apply one feedback event to `score`. The result is always in `[0, 1]`.
pub fn apply_delta(score: f64, positive: bool, impact: Impact, config: &ScoreConfig) -> f64 {
    clamp_score(clamp_score(score) + delta_for(positive, impact, config))
}

/// Ladder value suggested by a confidence score.
///
/// For display and audit only. Promotion is decided by the graduation
/// exam, never by this mapping.
pub fn derive_status_for_display(score: f64) -> MaturityLevel {
    let score = clamp_score(score);
    if score < 0.5 {
        MaturityLevel::Student
    } else if score < 0.7 {
        MaturityLevel::Intern
    } else if score < 0.9 {
        MaturityLevel::Supervised
    } else {
        MaturityLevel::Autonomous
    }
}

/// Result of a persisted score update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub agent_id: String,
    pub previous: f64,
    pub current: f64,
    /// Applied change after clamping (zero on a plateau).
    pub delta: f64,
    /// Stored status, unchanged by score updates.
    pub status: MaturityLevel,
    pub derived_status: MaturityLevel,
}

/// Persists confidence feedback and keeps the decision cache coherent.
pub struct ConfidenceScoreEngine {
    store: Arc<dyn AgentRecordStore>,
    cache: Arc<GovernanceCache>,
    locks: Arc<AgentLocks>,
    config: ScoreConfig,
}

impl ConfidenceScoreEngine {
    pub fn new(
        store: Arc<dyn AgentRecordStore>,
        cache: Arc<GovernanceCache>,
        locks: Arc<AgentLocks>,
        config: ScoreConfig,
    ) -> Self {
        Self {
            store,
            cache,
            locks,
            config,
        }
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Apply feedback to an agent's stored score.
    ///
    /// Cached decisions for the agent are invalidated before the write and
    /// again after it, so no later permission check sees the old state.
    #[instrument(skip(self))]
    pub async fn update_confidence(
        &self,
        tenant_id: &str,
        agent_id: &str,
        positive: bool,
        impact: Impact,
    ) -> Result<ScoreUpdate> {
        let _guard = self.locks.lock(tenant_id, agent_id).await;

        let mut agent = self.store.get(tenant_id, agent_id).await?;
        let previous = agent.confidence_score();
        let current = apply_delta(previous, positive, impact, &self.config);

        agent.set_confidence(current);
        agent.updated_at = Utc::now();

        self.cache.invalidate(tenant_id, agent_id);
        self.store.save(&agent).await?;
        self.cache.invalidate(tenant_id, agent_id);

        METRICS.inc_score_updates();
        obs::emit_confidence_updated(tenant_id, agent_id, previous, current, positive);

        Ok(ScoreUpdate {
            agent_id: agent.agent_id,
            previous,
            current,
            delta: current - previous,
            status: agent.status,
            derived_status: derive_status_for_display(current),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maturity_state::fakes::MemoryGovernanceStore;
    use maturity_state::AgentRecord;

    #[test]
    fn deltas_follow_impact_and_polarity() {
        let config = ScoreConfig::default();
        assert!((apply_delta(0.5, true, Impact::Low, &config) - 0.51).abs() < 1e-12);
        assert!((apply_delta(0.5, true, Impact::High, &config) - 0.55).abs() < 1e-12);
        assert!((apply_delta(0.5, false, Impact::Low, &config) - 0.48).abs() < 1e-12);
        assert!((apply_delta(0.5, false, Impact::High, &config) - 0.40).abs() < 1e-12);
    }

    #[test]
    fn plateaus_at_bounds() {
        let config = ScoreConfig::default();
        assert_eq!(apply_delta(1.0, true, Impact::High, &config), 1.0);
        assert_eq!(apply_delta(0.0, false, Impact::High, &config), 0.0);
        assert_eq!(apply_delta(0.99, true, Impact::High, &config), 1.0);
        assert_eq!(apply_delta(0.05, false, Impact::High, &config), 0.0);
    }

    #[test]
    fn display_status_thresholds() {
        assert_eq!(derive_status_for_display(0.0), MaturityLevel::Student);
        assert_eq!(derive_status_for_display(0.4999), MaturityLevel::Student);
        assert_eq!(derive_status_for_display(0.5), MaturityLevel::Intern);
        assert_eq!(derive_status_for_display(0.69), MaturityLevel::Intern);
        assert_eq!(derive_status_for_display(0.7), MaturityLevel::Supervised);
        assert_eq!(derive_status_for_display(0.8999), MaturityLevel::Supervised);
        assert_eq!(derive_status_for_display(0.9), MaturityLevel::Autonomous);
        assert_eq!(derive_status_for_display(1.0), MaturityLevel::Autonomous);
    }

    #[test]
    fn impact_parses() {
        assert_eq!("HIGH".parse::<Impact>(), Ok(Impact::High));
        assert!("medium".parse::<Impact>().is_err());
    }

    #[tokio::test]
    async fn update_persists_and_keeps_status() {
        let store = Arc::new(MemoryGovernanceStore::new());
        store
            .register(AgentRecord::new("acme", "a1", "Bot").with_confidence(0.88))
            .await
            .unwrap();
        let engine = ConfidenceScoreEngine::new(
            store.clone(),
            Arc::new(GovernanceCache::default()),
            Arc::new(AgentLocks::new()),
            ScoreConfig::default(),
        );

        let update = engine
            .update_confidence("acme", "a1", true, Impact::High)
            .await
            .unwrap();
        assert!((update.current - 0.93).abs() < 1e-9);
        assert_eq!(update.derived_status, MaturityLevel::Autonomous);
        assert_eq!(update.status, MaturityLevel::Student);

        let stored = store.get("acme", "a1").await.unwrap();
        assert!((stored.confidence_score() - 0.93).abs() < 1e-9);
        assert_eq!(stored.status, MaturityLevel::Student);
    }

    #[tokio::test]
    async fn update_unknown_agent_is_not_found() {
        let engine = ConfidenceScoreEngine::new(
            Arc::new(MemoryGovernanceStore::new()),
            Arc::new(GovernanceCache::default()),
            Arc::new(AgentLocks::new()),
            ScoreConfig::default(),
        );
        let err = engine
            .update_confidence("acme", "ghost", true, Impact::Low)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::domain::GovernanceError::AgentNotFound { .. }
        ));
    }
}
