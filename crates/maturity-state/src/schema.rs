//! Row definitions for the SurrealDB tables
//!
//! Tables:
//! - agents: agent identity and maturity state
//! - exams: completed graduation exams (key columns + full record detail)
//! - promotion_history: append-only ledger
//! - edge_cases: replayable failure scenarios
//! - users: role/specialty profile for data-access checks
//!
//! Rows use plain strings for enums and ids; conversion to the typed
//! records in [`crate::records`] happens at the store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::records::{
    AgentRecord, EdgeCaseRecord, ExamRecord, MaturityLevel, PromotionHistoryEntry, PromotionType,
    UnknownLevel, UserRecord,
};
use crate::storage_traits::StorageResult;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

fn parse_level(table: &str, raw: &str) -> StorageResult<MaturityLevel> {
    raw.parse().map_err(|e: UnknownLevel| StorageError::CorruptRecord {
        table: table.to_string(),
        reason: e.to_string(),
    })
}

fn parse_uuid(table: &str, raw: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StorageError::CorruptRecord {
        table: table.to_string(),
        reason: format!("invalid uuid '{raw}': {e}"),
    })
}

// ---------------------------------------------------------------------------
// agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRow {
    pub agent_id: String,
    pub tenant_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// "STUDENT" | "INTERN" | "SUPERVISED" | "AUTONOMOUS"
    pub status: String,
    pub confidence_score: f64,
    pub promotion_count: u32,
    #[serde(default, with = "surreal_datetime_opt")]
    pub last_promotion_at: Option<DateTime<Utc>>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub exam_eligible_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_exam_id: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl AgentRow {
    pub fn from_record(agent: &AgentRecord) -> Self {
        AgentRow {
            agent_id: agent.agent_id.clone(),
            tenant_id: agent.tenant_id.clone(),
            name: agent.name.clone(),
            category: agent.category.clone(),
            status: agent.status.as_str().to_string(),
            confidence_score: agent.confidence_score(),
            promotion_count: agent.promotion_count,
            last_promotion_at: agent.last_promotion_at,
            exam_eligible_at: agent.exam_eligible_at,
            last_exam_id: agent.last_exam_id.map(|id| id.to_string()),
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }

    pub fn into_record(self) -> StorageResult<AgentRecord> {
        let status = parse_level("agents", &self.status)?;
        let last_exam_id = self
            .last_exam_id
            .as_deref()
            .map(|raw| parse_uuid("agents", raw))
            .transpose()?;

        let mut agent = AgentRecord::new(self.tenant_id, self.agent_id, self.name)
            .with_status(status)
            .with_confidence(self.confidence_score);
        agent.category = self.category;
        agent.promotion_count = self.promotion_count;
        agent.last_promotion_at = self.last_promotion_at;
        agent.exam_eligible_at = self.exam_eligible_at;
        agent.last_exam_id = last_exam_id;
        agent.created_at = self.created_at;
        agent.updated_at = self.updated_at;
        Ok(agent)
    }
}

// ---------------------------------------------------------------------------
// promotion_history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRow {
    pub entry_id: String,
    pub agent_id: String,
    pub tenant_id: String,
    pub from_level: String,
    pub to_level: String,
    /// "AUTOMATIC" | "MANUAL" | "DEMOTION"
    pub promotion_type: String,
    #[serde(default)]
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub exam_id: Option<String>,
    #[serde(default)]
    pub promoted_by: Option<String>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub promoted_at: DateTime<Utc>,
}

impl PromotionRow {
    pub fn from_entry(entry: &PromotionHistoryEntry) -> Self {
        PromotionRow {
            entry_id: entry.entry_id.to_string(),
            agent_id: entry.agent_id.clone(),
            tenant_id: entry.tenant_id.clone(),
            from_level: entry.from_level.as_str().to_string(),
            to_level: entry.to_level.as_str().to_string(),
            promotion_type: entry.promotion_type.as_str().to_string(),
            readiness_score: entry.readiness_score,
            exam_id: entry.exam_id.map(|id| id.to_string()),
            promoted_by: entry.promoted_by.clone(),
            justification: entry.justification.clone(),
            promoted_at: entry.promoted_at,
        }
    }

    pub fn into_entry(self) -> StorageResult<PromotionHistoryEntry> {
        let promotion_type =
            self.promotion_type
                .parse::<PromotionType>()
                .map_err(|reason| StorageError::CorruptRecord {
                    table: "promotion_history".to_string(),
                    reason,
                })?;
        Ok(PromotionHistoryEntry {
            entry_id: parse_uuid("promotion_history", &self.entry_id)?,
            agent_id: self.agent_id,
            tenant_id: self.tenant_id,
            from_level: parse_level("promotion_history", &self.from_level)?,
            to_level: parse_level("promotion_history", &self.to_level)?,
            promotion_type,
            readiness_score: self.readiness_score,
            exam_id: self
                .exam_id
                .as_deref()
                .map(|raw| parse_uuid("promotion_history", raw))
                .transpose()?,
            promoted_by: self.promoted_by,
            justification: self.justification,
            promoted_at: self.promoted_at,
        })
    }
}

// ---------------------------------------------------------------------------
// exams
// ---------------------------------------------------------------------------

/// Exam row: indexed key columns plus the full record as `detail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamRow {
    pub exam_id: String,
    pub agent_id: String,
    pub tenant_id: String,
    pub target_level: String,
    pub passed: bool,
    pub promoted: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub completed_at: DateTime<Utc>,
    pub detail: serde_json::Value,
}

impl ExamRow {
    pub fn from_record(exam: &ExamRecord) -> StorageResult<Self> {
        Ok(ExamRow {
            exam_id: exam.exam_id.to_string(),
            agent_id: exam.agent_id.clone(),
            tenant_id: exam.tenant_id.clone(),
            target_level: exam.target_level.as_str().to_string(),
            passed: exam.passed,
            promoted: exam.promoted,
            failure_reason: exam.failure_reason.clone(),
            completed_at: exam.completed_at,
            detail: serde_json::to_value(exam)?,
        })
    }

    pub fn into_record(self) -> StorageResult<ExamRecord> {
        serde_json::from_value(self.detail).map_err(|e| StorageError::CorruptRecord {
            table: "exams".to_string(),
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// edge_cases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeCaseRow {
    pub case_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub violation_type: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Mirrors `tenant_id.is_none()` so visibility is a plain equality query.
    pub is_global: bool,
    pub active: bool,
    pub times_tested: u64,
    pub times_passed: u64,
    #[serde(default, with = "surreal_datetime_opt")]
    pub last_tested_at: Option<DateTime<Utc>>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl EdgeCaseRow {
    pub fn from_record(case: &EdgeCaseRecord) -> Self {
        EdgeCaseRow {
            case_id: case.case_id.clone(),
            name: case.name.clone(),
            description: case.description.clone(),
            violation_type: case.violation_type.clone(),
            tenant_id: case.tenant_id.clone(),
            is_global: case.tenant_id.is_none(),
            active: case.active,
            times_tested: case.times_tested,
            times_passed: case.times_passed,
            last_tested_at: case.last_tested_at,
            created_at: case.created_at,
        }
    }

    pub fn into_record(self) -> EdgeCaseRecord {
        EdgeCaseRecord {
            case_id: self.case_id,
            name: self.name,
            description: self.description,
            violation_type: self.violation_type,
            tenant_id: self.tenant_id,
            active: self.active,
            times_tested: self.times_tested,
            times_passed: self.times_passed,
            last_tested_at: self.last_tested_at,
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: String,
    pub role: String,
    #[serde(default)]
    pub specialty: Option<String>,
}

impl From<UserRecord> for UserRow {
    fn from(user: UserRecord) -> Self {
        UserRow {
            user_id: user.user_id,
            role: user.role,
            specialty: user.specialty,
        }
    }
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            user_id: row.user_id,
            role: row.role,
            specialty: row.specialty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_row_round_trip_preserves_state() {
        let mut agent = AgentRecord::new("acme", "agent-1", "Scheduler")
            .with_status(MaturityLevel::Supervised)
            .with_confidence(0.81)
            .with_category("finance");
        agent.promotion_count = 2;
        agent.last_exam_id = Some(Uuid::new_v4());

        let back = AgentRow::from_record(&agent).into_record().unwrap();
        assert_eq!(back, agent);
    }

    #[test]
    fn agent_row_rejects_unknown_status() {
        let mut row = AgentRow::from_record(&AgentRecord::new("acme", "a", "n"));
        row.status = "WIZARD".to_string();
        let err = row.into_record().unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { .. }));
    }

    #[test]
    fn agent_row_clamps_out_of_range_score() {
        let mut row = AgentRow::from_record(&AgentRecord::new("acme", "a", "n"));
        row.confidence_score = 3.0;
        assert_eq!(row.into_record().unwrap().confidence_score(), 1.0);
    }

    #[test]
    fn promotion_row_round_trip() {
        let agent = AgentRecord::new("acme", "agent-1", "Scheduler");
        let entry = PromotionHistoryEntry::new(
            &agent,
            MaturityLevel::Intern,
            PromotionType::Manual,
            Utc::now(),
        )
        .with_actor("admin-1", Some("pilot program".into()));

        let back = PromotionRow::from_entry(&entry).into_entry().unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn edge_case_row_marks_global() {
        let global = EdgeCaseRecord::new("ec-1", "leak", "pii", None);
        assert!(EdgeCaseRow::from_record(&global).is_global);
        let scoped = EdgeCaseRecord::new("ec-2", "refund", "financial", Some("acme".into()));
        assert!(!EdgeCaseRow::from_record(&scoped).is_global);
    }
}
