//! Graduation exam and status-change result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use maturity_state::{ExamRecord, MaturityLevel, PromotionHistoryEntry};

/// The four gated stages of a graduation exam, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStage {
    Readiness,
    EdgeCases,
    Constitutional,
    Skill,
}

impl std::fmt::Display for ExamStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Readiness => write!(f, "readiness"),
            Self::EdgeCases => write!(f, "edge cases"),
            Self::Constitutional => write!(f, "constitutional"),
            Self::Skill => write!(f, "skill"),
        }
    }
}

/// A stage that could not be evaluated because a collaborator failed.
/// Counts as an unmet condition; never aborts the exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: ExamStage,
    pub message: String,
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.message)
    }
}

/// Everything produced by a completed exam run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamReport {
    /// The persisted exam record.
    pub record: ExamRecord,
    /// Agent status after the exam.
    pub new_status: MaturityLevel,
    /// Ledger entry appended when a pass was applied.
    pub promotion: Option<PromotionHistoryEntry>,
    /// Cooldown deadline set on a failure.
    pub cooldown_until: Option<DateTime<Utc>>,
    pub stage_failures: Vec<StageFailure>,
}

impl ExamReport {
    pub fn passed(&self) -> bool {
        self.record.passed
    }
}

/// Result of asking for a graduation exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExamOutcome {
    /// The exam ran to completion (passed or failed).
    Completed(Box<ExamReport>),
    /// The agent is already AUTONOMOUS; nothing to do.
    NoFurtherLevel {
        agent_id: String,
        current_level: MaturityLevel,
    },
    /// The request was refused before any stage ran.
    Rejected { reason: String },
}

/// Whether an agent may sit an exam right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "eligibility", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible { target: MaturityLevel },
    NoFurtherLevel,
    CoolingDown { until: DateTime<Utc> },
}

/// Result of a manual promotion or demotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatusChangeOutcome {
    Applied { entry: PromotionHistoryEntry },
    Rejected { reason: String },
}

impl StatusChangeOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_names_stage() {
        let failure = StageFailure {
            stage: ExamStage::EdgeCases,
            message: "simulator unavailable".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "edge cases stage failed: simulator unavailable"
        );
    }

    #[test]
    fn stages_order_matches_reporting_order() {
        assert!(ExamStage::Readiness < ExamStage::EdgeCases);
        assert!(ExamStage::EdgeCases < ExamStage::Constitutional);
        assert!(ExamStage::Constitutional < ExamStage::Skill);
    }

    #[test]
    fn rejected_outcome_serializes_tagged() {
        let outcome = StatusChangeOutcome::Rejected {
            reason: "cannot demote to equal or higher level".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert!(!outcome.is_applied());
    }
}
