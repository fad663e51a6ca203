//! Administrative status changes and the promotion ledger view.
//!
//! Manual promotion and demotion bypass the graduation exam. Invalid input
//! (unknown level, demotion that is not a step down) yields
//! [`StatusChangeOutcome::Rejected`]; only a missing agent or a storage
//! failure is an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::cache::GovernanceCache;
use crate::confidence::derive_status_for_display;
use crate::domain::{Result, StatusChangeOutcome};
use crate::locks::AgentLocks;
use crate::obs;
use maturity_state::{
    AgentRecord, ExamRecord, GovernanceStore, MaturityLevel, PromotionHistoryEntry, PromotionType,
};

/// Entries shown in a summary's recent history.
const SUMMARY_HISTORY_LIMIT: usize = 5;

/// Read-only snapshot of where an agent stands on the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSummary {
    pub agent_id: String,
    pub tenant_id: String,
    pub current_level: MaturityLevel,
    pub confidence_score: f64,
    /// Level suggested by the confidence score. Display only.
    pub display_status: MaturityLevel,
    pub promotion_count: u32,
    pub last_promotion_at: Option<DateTime<Utc>>,
    pub exam_eligible_at: Option<DateTime<Utc>>,
    pub latest_exam: Option<ExamRecord>,
    pub recent_history: Vec<PromotionHistoryEntry>,
}

pub struct PromotionService {
    store: Arc<dyn GovernanceStore>,
    cache: Arc<GovernanceCache>,
    locks: Arc<AgentLocks>,
}

impl PromotionService {
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        cache: Arc<GovernanceCache>,
        locks: Arc<AgentLocks>,
    ) -> Self {
        Self {
            store,
            cache,
            locks,
        }
    }

    /// Set an agent to any ladder level and record a MANUAL entry.
    #[instrument(skip(self, justification))]
    pub async fn promote_agent_manually(
        &self,
        tenant_id: &str,
        agent_id: &str,
        new_level: &str,
        actor: &str,
        justification: Option<String>,
    ) -> Result<StatusChangeOutcome> {
        let level = match new_level.parse::<MaturityLevel>() {
            Ok(level) => level,
            Err(err) => {
                return Ok(StatusChangeOutcome::Rejected {
                    reason: err.to_string(),
                })
            }
        };

        let _guard = self.locks.lock(tenant_id, agent_id).await;
        let agent = self.store.get(tenant_id, agent_id).await?;
        let now = Utc::now();
        let entry = PromotionHistoryEntry::new(&agent, level, PromotionType::Manual, now)
            .with_actor(actor, justification);

        let mut updated = agent;
        updated.status = level;
        updated.promotion_count += 1;
        updated.last_promotion_at = Some(now);
        updated.updated_at = now;

        self.commit(&updated, entry).await
    }

    /// Move an agent strictly down the ladder and record a DEMOTION entry.
    #[instrument(skip(self, justification))]
    pub async fn demote_agent(
        &self,
        tenant_id: &str,
        agent_id: &str,
        new_level: &str,
        actor: &str,
        justification: Option<String>,
    ) -> Result<StatusChangeOutcome> {
        let level = match new_level.parse::<MaturityLevel>() {
            Ok(level) => level,
            Err(err) => {
                return Ok(StatusChangeOutcome::Rejected {
                    reason: err.to_string(),
                })
            }
        };

        let _guard = self.locks.lock(tenant_id, agent_id).await;
        let agent = self.store.get(tenant_id, agent_id).await?;
        if level.index() >= agent.status.index() {
            return Ok(StatusChangeOutcome::Rejected {
                reason: format!(
                    "cannot demote to equal or higher level ({} -> {})",
                    agent.status, level
                ),
            });
        }

        let now = Utc::now();
        let entry = PromotionHistoryEntry::new(&agent, level, PromotionType::Demotion, now)
            .with_actor(actor, justification);

        // last_promotion_at is left as is.
        let mut updated = agent;
        updated.status = level;
        updated.updated_at = now;

        self.commit(&updated, entry).await
    }

    async fn commit(
        &self,
        agent: &AgentRecord,
        entry: PromotionHistoryEntry,
    ) -> Result<StatusChangeOutcome> {
        self.cache.invalidate(&agent.tenant_id, &agent.agent_id);
        let entry = self.store.commit_status_change(agent, entry).await?;
        self.cache.invalidate(&agent.tenant_id, &agent.agent_id);

        info!(
            agent_id = %agent.agent_id,
            from = %entry.from_level,
            to = %entry.to_level,
            kind = entry.promotion_type.as_str(),
            "status changed"
        );
        obs::emit_promotion_recorded(&entry);
        Ok(StatusChangeOutcome::Applied { entry })
    }

    /// Ledger entries for an agent, newest first.
    pub async fn history(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<PromotionHistoryEntry>> {
        // Surface an unknown agent instead of an empty ledger.
        self.store.get(tenant_id, agent_id).await?;
        Ok(self.store.history(tenant_id, agent_id, limit).await?)
    }

    pub async fn promotion_summary(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<PromotionSummary> {
        let agent = self.store.get(tenant_id, agent_id).await?;
        let latest_exam = self
            .store
            .list_exams(tenant_id, agent_id, 1)
            .await?
            .into_iter()
            .next();
        let recent_history = self
            .store
            .history(tenant_id, agent_id, SUMMARY_HISTORY_LIMIT)
            .await?;

        Ok(PromotionSummary {
            display_status: derive_status_for_display(agent.confidence_score()),
            confidence_score: agent.confidence_score(),
            current_level: agent.status,
            promotion_count: agent.promotion_count,
            last_promotion_at: agent.last_promotion_at,
            exam_eligible_at: agent.exam_eligible_at,
            agent_id: agent.agent_id,
            tenant_id: agent.tenant_id,
            latest_exam,
            recent_history,
        })
    }
}
