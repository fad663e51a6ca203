//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryGovernanceStore` satisfies every storage trait without any
//! external dependencies. All tables sit behind one mutex, which makes the
//! commit operations trivially atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;
use crate::records::{AgentRecord, EdgeCaseRecord, ExamRecord, PromotionHistoryEntry, UserRecord};
use crate::storage_traits::*;

fn agent_key(tenant_id: &str, agent_id: &str) -> (String, String) {
    (tenant_id.to_string(), agent_id.to_string())
}

#[derive(Debug, Default)]
struct Tables {
    agents: HashMap<(String, String), AgentRecord>,
    /// Insertion order doubles as the tie-breaker for equal timestamps.
    promotions: Vec<PromotionHistoryEntry>,
    exams: Vec<ExamRecord>,
    edge_cases: Vec<EdgeCaseRecord>,
    users: HashMap<String, UserRecord>,
}

/// In-memory governance store backed by plain collections.
#[derive(Debug, Default)]
pub struct MemoryGovernanceStore {
    tables: Mutex<Tables>,
    fail_commits: AtomicBool,
}

impl MemoryGovernanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail with a backend error, simulating an
    /// unavailable database. Nothing is written while enabled.
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of ledger entries across all agents.
    pub fn promotion_count(&self) -> usize {
        self.tables.lock().map(|t| t.promotions.len()).unwrap_or(0)
    }

    /// Number of exam records across all agents.
    pub fn exam_count(&self) -> usize {
        self.tables.lock().map(|t| t.exams.len()).unwrap_or(0)
    }

    fn tables(&self) -> StorageResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }

    fn check_commit_allowed(&self) -> StorageResult<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected commit failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AgentRecordStore for MemoryGovernanceStore {
    async fn register(&self, agent: AgentRecord) -> StorageResult<AgentRecord> {
        let mut tables = self.tables()?;
        let key = agent_key(&agent.tenant_id, &agent.agent_id);
        if tables.agents.contains_key(&key) {
            return Err(StorageError::AgentExists {
                tenant_id: agent.tenant_id.clone(),
                agent_id: agent.agent_id.clone(),
            });
        }
        tables.agents.insert(key, agent.clone());
        Ok(agent)
    }

    async fn get(&self, tenant_id: &str, agent_id: &str) -> StorageResult<AgentRecord> {
        let tables = self.tables()?;
        tables
            .agents
            .get(&agent_key(tenant_id, agent_id))
            .cloned()
            .ok_or_else(|| StorageError::AgentNotFound {
                tenant_id: tenant_id.to_string(),
                agent_id: agent_id.to_string(),
            })
    }

    async fn save(&self, agent: &AgentRecord) -> StorageResult<()> {
        let mut tables = self.tables()?;
        let slot = tables
            .agents
            .get_mut(&agent_key(&agent.tenant_id, &agent.agent_id))
            .ok_or_else(|| StorageError::AgentNotFound {
                tenant_id: agent.tenant_id.clone(),
                agent_id: agent.agent_id.clone(),
            })?;
        *slot = agent.clone();
        Ok(())
    }
}

#[async_trait]
impl PromotionLedger for MemoryGovernanceStore {
    async fn record(&self, entry: PromotionHistoryEntry) -> StorageResult<PromotionHistoryEntry> {
        let mut tables = self.tables()?;
        tables.promotions.push(entry.clone());
        Ok(entry)
    }

    async fn history(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<PromotionHistoryEntry>> {
        let tables = self.tables()?;
        let mut entries: Vec<PromotionHistoryEntry> = tables
            .promotions
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id && e.agent_id == agent_id)
            .cloned()
            .collect();
        // Stable sort keeps newest-inserted first among equal timestamps.
        entries.sort_by(|a, b| b.promoted_at.cmp(&a.promoted_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[async_trait]
impl ExamStore for MemoryGovernanceStore {
    async fn get_exam(&self, exam_id: &Uuid) -> StorageResult<ExamRecord> {
        let tables = self.tables()?;
        tables
            .exams
            .iter()
            .find(|e| e.exam_id == *exam_id)
            .cloned()
            .ok_or_else(|| StorageError::ExamNotFound {
                exam_id: exam_id.to_string(),
            })
    }

    async fn list_exams(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ExamRecord>> {
        let tables = self.tables()?;
        let mut exams: Vec<ExamRecord> = tables
            .exams
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id && e.agent_id == agent_id)
            .cloned()
            .collect();
        exams.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        exams.truncate(limit);
        Ok(exams)
    }
}

#[async_trait]
impl EdgeCaseLibrary for MemoryGovernanceStore {
    async fn add_edge_case(&self, case: EdgeCaseRecord) -> StorageResult<()> {
        let mut tables = self.tables()?;
        tables.edge_cases.retain(|c| c.case_id != case.case_id);
        tables.edge_cases.push(case);
        Ok(())
    }

    async fn list_active(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<EdgeCaseRecord>> {
        let tables = self.tables()?;
        Ok(tables
            .edge_cases
            .iter()
            .filter(|c| c.active && c.is_visible_to(tenant_id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_test_result(
        &self,
        case_id: &str,
        passed: bool,
        tested_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut tables = self.tables()?;
        let case = tables
            .edge_cases
            .iter_mut()
            .find(|c| c.case_id == case_id)
            .ok_or_else(|| StorageError::EdgeCaseNotFound {
                case_id: case_id.to_string(),
            })?;
        case.times_tested += 1;
        if passed {
            case.times_passed += 1;
        }
        case.last_tested_at = Some(tested_at);
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryGovernanceStore {
    async fn get_user(&self, user_id: &str) -> StorageResult<Option<UserRecord>> {
        let tables = self.tables()?;
        Ok(tables.users.get(user_id).cloned())
    }

    async fn put_user(&self, user: UserRecord) -> StorageResult<()> {
        let mut tables = self.tables()?;
        tables.users.insert(user.user_id.clone(), user);
        Ok(())
    }
}

#[async_trait]
impl GovernanceStore for MemoryGovernanceStore {
    async fn commit_exam(&self, commit: ExamCommit) -> StorageResult<()> {
        self.check_commit_allowed()?;
        let mut tables = self.tables()?;
        let key = agent_key(&commit.agent.tenant_id, &commit.agent.agent_id);
        if !tables.agents.contains_key(&key) {
            return Err(StorageError::AgentNotFound {
                tenant_id: commit.agent.tenant_id.clone(),
                agent_id: commit.agent.agent_id.clone(),
            });
        }
        tables.agents.insert(key, commit.agent);
        tables.exams.push(commit.exam);
        if let Some(entry) = commit.promotion {
            tables.promotions.push(entry);
        }
        Ok(())
    }

    async fn commit_status_change(
        &self,
        agent: &AgentRecord,
        entry: PromotionHistoryEntry,
    ) -> StorageResult<PromotionHistoryEntry> {
        self.check_commit_allowed()?;
        let mut tables = self.tables()?;
        let slot = tables
            .agents
            .get_mut(&agent_key(&agent.tenant_id, &agent.agent_id))
            .ok_or_else(|| StorageError::AgentNotFound {
                tenant_id: agent.tenant_id.clone(),
                agent_id: agent.agent_id.clone(),
            })?;
        *slot = agent.clone();
        tables.promotions.push(entry.clone());
        Ok(entry)
    }
}
