//! SurrealDB-backed governance store
//!
//! Uses the row types in `schema` for persistence, converting to/from the
//! record types at the boundary. Commit operations run as a single
//! SurrealQL transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::handle;
use crate::records::{AgentRecord, EdgeCaseRecord, ExamRecord, PromotionHistoryEntry, UserRecord};
use crate::schema::{AgentRow, EdgeCaseRow, ExamRow, PromotionRow, UserRow};
use crate::storage_traits::*;

/// SurrealDB-backed implementation of [`GovernanceStore`],
/// [`EdgeCaseLibrary`] and [`UserDirectory`].
#[derive(Clone)]
pub struct SurrealGovernanceStore {
    db: Surreal<Any>,
}

impl SurrealGovernanceStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let db = handle::connect_url("mem://").await?;
        info!("SurrealGovernanceStore connected (in-memory)");
        Ok(Self { db })
    }

    /// Connect to an explicit engine URL (`mem://`, `surrealkv://path`, `ws://...`).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        Ok(Self {
            db: handle::connect_url(url).await?,
        })
    }

    /// Create from environment variables, see [`handle::connect_from_env`].
    pub async fn from_env() -> crate::Result<Self> {
        Ok(Self {
            db: handle::connect_from_env().await?,
        })
    }

    /// Wrap an already connected and migrated client.
    pub fn from_client(db: Surreal<Any>) -> Self {
        Self { db }
    }

    // -- private helpers -----------------------------------------------------

    async fn fetch_agent(&self, tenant_id: &str, agent_id: &str) -> StorageResult<Option<AgentRow>> {
        let mut res = self
            .db
            .query("SELECT * FROM agents WHERE tenant_id = $tid AND agent_id = $aid")
            .bind(("tid", tenant_id.to_string()))
            .bind(("aid", agent_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<AgentRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(rows.into_iter().next())
    }

    async fn require_agent(&self, agent: &AgentRecord) -> StorageResult<()> {
        match self.fetch_agent(&agent.tenant_id, &agent.agent_id).await? {
            Some(_) => Ok(()),
            None => Err(StorageError::AgentNotFound {
                tenant_id: agent.tenant_id.clone(),
                agent_id: agent.agent_id.clone(),
            }),
        }
    }
}

#[async_trait]
impl AgentRecordStore for SurrealGovernanceStore {
    async fn register(&self, agent: AgentRecord) -> StorageResult<AgentRecord> {
        if self
            .fetch_agent(&agent.tenant_id, &agent.agent_id)
            .await?
            .is_some()
        {
            return Err(StorageError::AgentExists {
                tenant_id: agent.tenant_id.clone(),
                agent_id: agent.agent_id.clone(),
            });
        }

        debug!(tenant_id = %agent.tenant_id, agent_id = %agent.agent_id, "registering agent");

        let _created: Option<AgentRow> = self
            .db
            .create("agents")
            .content(AgentRow::from_record(&agent))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(agent)
    }

    async fn get(&self, tenant_id: &str, agent_id: &str) -> StorageResult<AgentRecord> {
        self.fetch_agent(tenant_id, agent_id)
            .await?
            .ok_or_else(|| StorageError::AgentNotFound {
                tenant_id: tenant_id.to_string(),
                agent_id: agent_id.to_string(),
            })?
            .into_record()
    }

    async fn save(&self, agent: &AgentRecord) -> StorageResult<()> {
        self.require_agent(agent).await?;

        self.db
            .query("UPDATE agents CONTENT $row WHERE tenant_id = $tid AND agent_id = $aid")
            .bind(("row", AgentRow::from_record(agent)))
            .bind(("tid", agent.tenant_id.clone()))
            .bind(("aid", agent.agent_id.clone()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl PromotionLedger for SurrealGovernanceStore {
    async fn record(&self, entry: PromotionHistoryEntry) -> StorageResult<PromotionHistoryEntry> {
        let _created: Option<PromotionRow> = self
            .db
            .create("promotion_history")
            .content(PromotionRow::from_entry(&entry))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(entry)
    }

    async fn history(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<PromotionHistoryEntry>> {
        let sql = format!(
            "SELECT * FROM promotion_history WHERE tenant_id = $tid AND agent_id = $aid \
             ORDER BY promoted_at DESC LIMIT {limit}"
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("tid", tenant_id.to_string()))
            .bind(("aid", agent_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<PromotionRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(PromotionRow::into_entry).collect()
    }
}

#[async_trait]
impl ExamStore for SurrealGovernanceStore {
    async fn get_exam(&self, exam_id: &Uuid) -> StorageResult<ExamRecord> {
        let mut res = self
            .db
            .query("SELECT * FROM exams WHERE exam_id = $eid")
            .bind(("eid", exam_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<ExamRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::ExamNotFound {
                exam_id: exam_id.to_string(),
            })?
            .into_record()
    }

    async fn list_exams(
        &self,
        tenant_id: &str,
        agent_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<ExamRecord>> {
        let sql = format!(
            "SELECT * FROM exams WHERE tenant_id = $tid AND agent_id = $aid \
             ORDER BY completed_at DESC LIMIT {limit}"
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("tid", tenant_id.to_string()))
            .bind(("aid", agent_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<ExamRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(ExamRow::into_record).collect()
    }
}

#[async_trait]
impl EdgeCaseLibrary for SurrealGovernanceStore {
    async fn add_edge_case(&self, case: EdgeCaseRecord) -> StorageResult<()> {
        let case_id = case.case_id.clone();
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE edge_cases WHERE case_id = $cid; \
                 CREATE edge_cases CONTENT $row; \
                 COMMIT TRANSACTION;",
            )
            .bind(("cid", case_id))
            .bind(("row", EdgeCaseRow::from_record(&case)))
            .await?
            .check()?;
        Ok(())
    }

    async fn list_active(
        &self,
        tenant_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<EdgeCaseRecord>> {
        let sql = format!(
            "SELECT * FROM edge_cases WHERE active = true \
             AND (is_global = true OR tenant_id = $tid) \
             ORDER BY created_at ASC LIMIT {limit}"
        );
        let mut res = self
            .db
            .query(sql)
            .bind(("tid", tenant_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<EdgeCaseRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(EdgeCaseRow::into_record).collect())
    }

    async fn record_test_result(
        &self,
        case_id: &str,
        passed: bool,
        tested_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut res = self
            .db
            .query(
                "UPDATE edge_cases SET times_tested += 1, times_passed += $inc, \
                 last_tested_at = $at WHERE case_id = $cid",
            )
            .bind(("inc", if passed { 1i64 } else { 0i64 }))
            .bind(("at", SurrealDatetime::from(tested_at)))
            .bind(("cid", case_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<EdgeCaseRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if rows.is_empty() {
            return Err(StorageError::EdgeCaseNotFound {
                case_id: case_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SurrealGovernanceStore {
    async fn get_user(&self, user_id: &str) -> StorageResult<Option<UserRecord>> {
        let mut res = self
            .db
            .query("SELECT * FROM users WHERE user_id = $uid")
            .bind(("uid", user_id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<UserRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().next().map(UserRecord::from))
    }

    async fn put_user(&self, user: UserRecord) -> StorageResult<()> {
        let uid = user.user_id.clone();
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE users WHERE user_id = $uid; \
                 CREATE users CONTENT $row; \
                 COMMIT TRANSACTION;",
            )
            .bind(("uid", uid))
            .bind(("row", UserRow::from(user)))
            .await?
            .check()?;
        Ok(())
    }
}

#[async_trait]
impl GovernanceStore for SurrealGovernanceStore {
    async fn commit_exam(&self, commit: ExamCommit) -> StorageResult<()> {
        self.require_agent(&commit.agent).await?;

        let exam_row = ExamRow::from_record(&commit.exam)?;
        let agent_row = AgentRow::from_record(&commit.agent);

        debug!(
            exam_id = %commit.exam.exam_id,
            agent_id = %commit.agent.agent_id,
            promoted = commit.promotion.is_some(),
            "committing exam"
        );

        let query = match commit.promotion {
            Some(entry) => self
                .db
                .query(
                    "BEGIN TRANSACTION; \
                     CREATE exams CONTENT $exam; \
                     UPDATE agents CONTENT $agent WHERE tenant_id = $tid AND agent_id = $aid; \
                     CREATE promotion_history CONTENT $entry; \
                     COMMIT TRANSACTION;",
                )
                .bind(("entry", PromotionRow::from_entry(&entry))),
            None => self.db.query(
                "BEGIN TRANSACTION; \
                 CREATE exams CONTENT $exam; \
                 UPDATE agents CONTENT $agent WHERE tenant_id = $tid AND agent_id = $aid; \
                 COMMIT TRANSACTION;",
            ),
        };

        query
            .bind(("exam", exam_row))
            .bind(("agent", agent_row))
            .bind(("tid", commit.agent.tenant_id.clone()))
            .bind(("aid", commit.agent.agent_id.clone()))
            .await?
            .check()?;

        Ok(())
    }

    async fn commit_status_change(
        &self,
        agent: &AgentRecord,
        entry: PromotionHistoryEntry,
    ) -> StorageResult<PromotionHistoryEntry> {
        self.require_agent(agent).await?;

        self.db
            .query(
                "BEGIN TRANSACTION; \
                 UPDATE agents CONTENT $agent WHERE tenant_id = $tid AND agent_id = $aid; \
                 CREATE promotion_history CONTENT $entry; \
                 COMMIT TRANSACTION;",
            )
            .bind(("agent", AgentRow::from_record(agent)))
            .bind(("entry", PromotionRow::from_entry(&entry)))
            .bind(("tid", agent.tenant_id.clone()))
            .bind(("aid", agent.agent_id.clone()))
            .await?
            .check()?;

        Ok(entry)
    }
}
