//! Storage trait definitions for maturity governance
//!
//! These traits define the persistence seams the governance engine consumes:
//! - `AgentRecordStore`: agent identity and maturity state (load/save)
//! - `PromotionLedger`: append-only promotion/demotion history
//! - `ExamStore`: read access to completed graduation exams
//! - `EdgeCaseLibrary`: replayable failure scenarios and their statistics
//! - `UserDirectory`: user roles and specialties for data-access checks
//! - `GovernanceStore`: the combination, plus the atomic commit operations
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; `SurrealGovernanceStore` is the
//! database-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;
use crate::records::{AgentRecord, EdgeCaseRecord, ExamRecord, PromotionHistoryEntry, UserRecord};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// AgentRecordStore
// ---------------------------------------------------------------------------

/// Agent identity and maturity state.
///
/// Agents are addressed by `(tenant_id, agent_id)`. Records are never
/// deleted through this trait.
#[async_trait]
pub trait AgentRecordStore: Send + Sync {
    /// Insert a new agent. Fails with `AgentExists` on a duplicate id.
    async fn register(&self, agent: AgentRecord) -> StorageResult<AgentRecord>;

    /// Load an agent. Fails with `AgentNotFound` if absent.
    async fn get(&self, tenant_id: &str, agent_id: &str) -> StorageResult<AgentRecord>;

    /// Overwrite an existing agent. Fails with `AgentNotFound` if absent.
    async fn save(&self, agent: &AgentRecord) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// PromotionLedger
// ---------------------------------------------------------------------------

/// Append-only promotion history.
///
/// Semantics:
/// - `record` appends; no update or delete operation exists.
/// - `history` returns entries newest first (by `promoted_at`), at most
///   `limit` of them.
#[async_trait]
pub trait PromotionLedger: Send + Sync {
    async fn record(&self, entry: PromotionHistoryEntry) -> StorageResult<PromotionHistoryEntry>;

    async fn history(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<PromotionHistoryEntry>>;
}

// ---------------------------------------------------------------------------
// ExamStore
// ---------------------------------------------------------------------------

/// Read access to persisted exam records. Writes go through
/// [`GovernanceStore::commit_exam`].
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn get_exam(&self, exam_id: &Uuid) -> StorageResult<ExamRecord>;

    /// Exams for one agent, newest first.
    async fn list_exams(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ExamRecord>>;
}

// ---------------------------------------------------------------------------
// EdgeCaseLibrary
// ---------------------------------------------------------------------------

/// Library of historical failure scenarios.
#[async_trait]
pub trait EdgeCaseLibrary: Send + Sync {
    async fn add_edge_case(&self, case: EdgeCaseRecord) -> StorageResult<()>;

    /// Active cases visible to the tenant (tenant-owned or global), at most
    /// `limit` of them.
    async fn list_active(&self, tenant_id: &str, limit: usize)
        -> StorageResult<Vec<EdgeCaseRecord>>;

    /// Bump `times_tested` (and `times_passed` when `passed`) and stamp
    /// `last_tested_at`.
    async fn record_test_result(
        &self,
        case_id: &str,
        passed: bool,
        tested_at: DateTime<Utc>,
    ) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// UserDirectory
// ---------------------------------------------------------------------------

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user. `Ok(None)` when the user is unknown.
    async fn get_user(&self, user_id: &str) -> StorageResult<Option<UserRecord>>;

    async fn put_user(&self, user: UserRecord) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// GovernanceStore: atomic commits
// ---------------------------------------------------------------------------

/// Everything written when an exam completes.
///
/// `agent` always carries the updated exam bookkeeping (`last_exam_id`,
/// and on failure `exam_eligible_at`); on a pass it also carries the new
/// status and promotion fields, and `promotion` holds the ledger entry.
#[derive(Debug, Clone)]
pub struct ExamCommit {
    pub exam: ExamRecord,
    pub agent: AgentRecord,
    pub promotion: Option<PromotionHistoryEntry>,
}

/// Combined store with all-or-nothing commit operations.
///
/// Guarantees:
/// - `commit_exam` persists the exam record, the agent update and the
///   optional ledger entry together, or none of them.
/// - `commit_status_change` persists the agent update and its ledger entry
///   together, or neither.
#[async_trait]
pub trait GovernanceStore: AgentRecordStore + PromotionLedger + ExamStore {
    async fn commit_exam(&self, commit: ExamCommit) -> StorageResult<()>;

    async fn commit_status_change(
        &self,
        agent: &AgentRecord,
        entry: PromotionHistoryEntry,
    ) -> StorageResult<PromotionHistoryEntry>;
}
