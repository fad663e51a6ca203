//! Record types persisted by the governance stores.
//!
//! - `MaturityLevel`: the ordered maturity ladder
//! - `AgentRecord`: identity plus mutable maturity state of one agent
//! - `ExamRecord`: one row per graduation attempt
//! - `PromotionHistoryEntry`: append-only promotion/demotion ledger row
//! - `EdgeCaseRecord`: a replayable historical failure scenario
//! - `UserRecord`: the slice of a user profile needed for data-access checks

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// MaturityLevel
// ---------------------------------------------------------------------------

/// Rung on the maturity ladder: STUDENT < INTERN < SUPERVISED < AUTONOMOUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaturityLevel {
    Student,
    Intern,
    Supervised,
    Autonomous,
}

impl MaturityLevel {
    /// All ladder values, lowest first.
    pub const ALL: [MaturityLevel; 4] = [
        MaturityLevel::Student,
        MaturityLevel::Intern,
        MaturityLevel::Supervised,
        MaturityLevel::Autonomous,
    ];

    /// Position on the ladder (0..=3).
    pub fn index(self) -> usize {
        match self {
            Self::Student => 0,
            Self::Intern => 1,
            Self::Supervised => 2,
            Self::Autonomous => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The rung directly above this one, `None` at AUTONOMOUS.
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Intern => "INTERN",
            Self::Supervised => "SUPERVISED",
            Self::Autonomous => "AUTONOMOUS",
        }
    }
}

impl std::fmt::Display for MaturityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the four ladder values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLevel(pub String);

impl std::fmt::Display for UnknownLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown maturity level '{}' (expected one of STUDENT, INTERN, SUPERVISED, AUTONOMOUS)",
            self.0
        )
    }
}

impl std::error::Error for UnknownLevel {}

impl FromStr for MaturityLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "intern" => Ok(Self::Intern),
            "supervised" => Ok(Self::Supervised),
            "autonomous" => Ok(Self::Autonomous),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

/// Clamp a confidence score into `[0.0, 1.0]`. NaN collapses to 0.0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

fn deserialize_clamped<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_score(raw))
}

// ---------------------------------------------------------------------------
// AgentRecord
// ---------------------------------------------------------------------------

/// Identity and maturity state of a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub tenant_id: String,
    pub name: String,
    /// Domain category, matched against a user's specialty for data access.
    pub category: Option<String>,
    pub status: MaturityLevel,
    #[serde(deserialize_with = "deserialize_clamped")]
    confidence_score: f64,
    pub promotion_count: u32,
    pub last_promotion_at: Option<DateTime<Utc>>,
    /// Cooldown deadline set after a failed exam.
    pub exam_eligible_at: Option<DateTime<Utc>>,
    pub last_exam_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentRecord {
    /// A freshly registered agent: STUDENT with a neutral 0.5 confidence.
    pub fn new(
        tenant_id: impl Into<String>,
        agent_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            category: None,
            status: MaturityLevel::Student,
            confidence_score: 0.5,
            promotion_count: 0,
            last_promotion_at: None,
            exam_eligible_at: None,
            last_exam_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: MaturityLevel) -> Self {
        self.status = status;
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.set_confidence(score);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    /// Store a new confidence score, clamped into `[0.0, 1.0]`.
    pub fn set_confidence(&mut self, score: f64) {
        self.confidence_score = clamp_score(score);
    }

    /// Whether a failed-exam cooldown is still running at `now`.
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.exam_eligible_at.map(|until| until > now).unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// ExamRecord
// ---------------------------------------------------------------------------

/// Outcome of replaying one edge case against the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCaseResult {
    pub case_id: String,
    pub name: String,
    pub passed: bool,
    pub violations: Vec<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Medium,
    High,
}

/// Why an episode was flagged by the constitutional scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Constitutional score below the compliance threshold.
    LowScore,
    /// Human intervened during the episode. Informational only.
    HumanIntervention,
}

/// One flagged episode from the constitutional scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionalViolation {
    pub episode_id: String,
    pub kind: ViolationKind,
    pub severity: ViolationSeverity,
    pub constitutional_score: f64,
    pub intervention_count: u32,
    pub started_at: Option<DateTime<Utc>>,
}

/// A completed graduation attempt. Persisted exactly once per exam run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub exam_id: Uuid,
    pub agent_id: String,
    pub tenant_id: String,
    pub current_level: MaturityLevel,
    pub target_level: MaturityLevel,

    pub readiness_score: f64,
    pub zero_intervention_ratio: f64,
    pub avg_constitutional_score: f64,
    pub avg_confidence_score: f64,
    pub success_rate: f64,
    pub episodes_analyzed: u32,

    pub edge_cases_total: u32,
    pub edge_cases_passed: u32,
    pub edge_case_results: Vec<EdgeCaseResult>,

    pub constitutional_violations: Vec<ConstitutionalViolation>,

    pub skill_mastery_score: f64,
    pub skill_diversity: f64,
    pub unique_skills_used: u32,
    pub skill_execution_count: u64,
    pub skill_success_rate: f64,

    pub passed: bool,
    /// Comma-joined list of unmet sub-conditions, `None` when passed.
    pub failure_reason: Option<String>,
    pub promoted: bool,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PromotionHistoryEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionType {
    /// Promotion granted by a passed graduation exam.
    Automatic,
    /// Administrative override.
    Manual,
    Demotion,
}

impl PromotionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automatic => "AUTOMATIC",
            Self::Manual => "MANUAL",
            Self::Demotion => "DEMOTION",
        }
    }
}

impl FromStr for PromotionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AUTOMATIC" => Ok(Self::Automatic),
            "MANUAL" => Ok(Self::Manual),
            "DEMOTION" => Ok(Self::Demotion),
            other => Err(format!("unknown promotion type: {other}")),
        }
    }
}

/// Append-only ledger row describing one status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionHistoryEntry {
    pub entry_id: Uuid,
    pub agent_id: String,
    pub tenant_id: String,
    pub from_level: MaturityLevel,
    pub to_level: MaturityLevel,
    pub promotion_type: PromotionType,
    pub readiness_score: Option<f64>,
    pub exam_id: Option<Uuid>,
    pub promoted_by: Option<String>,
    pub justification: Option<String>,
    pub promoted_at: DateTime<Utc>,
}

impl PromotionHistoryEntry {
    pub fn new(
        agent: &AgentRecord,
        to_level: MaturityLevel,
        promotion_type: PromotionType,
        promoted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            agent_id: agent.agent_id.clone(),
            tenant_id: agent.tenant_id.clone(),
            from_level: agent.status,
            to_level,
            promotion_type,
            readiness_score: None,
            exam_id: None,
            promoted_by: None,
            justification: None,
            promoted_at,
        }
    }

    pub fn with_exam(mut self, exam_id: Uuid, readiness_score: f64) -> Self {
        self.exam_id = Some(exam_id);
        self.readiness_score = Some(readiness_score);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>, justification: Option<String>) -> Self {
        self.promoted_by = Some(actor.into());
        self.justification = justification;
        self
    }
}

// ---------------------------------------------------------------------------
// EdgeCaseRecord
// ---------------------------------------------------------------------------

/// A recorded failure scenario replayed during graduation exams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCaseRecord {
    pub case_id: String,
    pub name: String,
    pub description: Option<String>,
    pub violation_type: String,
    /// Owning tenant; `None` means the case is global.
    pub tenant_id: Option<String>,
    pub active: bool,
    pub times_tested: u64,
    pub times_passed: u64,
    pub last_tested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EdgeCaseRecord {
    pub fn new(
        case_id: impl Into<String>,
        name: impl Into<String>,
        violation_type: impl Into<String>,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            name: name.into(),
            description: None,
            violation_type: violation_type.into(),
            tenant_id,
            active: true,
            times_tested: 0,
            times_passed: 0,
            last_tested_at: None,
            created_at: Utc::now(),
        }
    }

    /// Global cases are visible to every tenant.
    pub fn is_visible_to(&self, tenant_id: &str) -> bool {
        self.tenant_id.as_deref().map(|t| t == tenant_id).unwrap_or(true)
    }
}

// ---------------------------------------------------------------------------
// UserRecord
// ---------------------------------------------------------------------------

/// User profile fields consulted by agent data-access checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub role: String,
    pub specialty: Option<String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            specialty: None,
        }
    }

    pub fn with_specialty(mut self, specialty: impl Into<String>) -> Self {
        self.specialty = Some(specialty.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_ordered() {
        assert!(MaturityLevel::Student < MaturityLevel::Intern);
        assert!(MaturityLevel::Intern < MaturityLevel::Supervised);
        assert!(MaturityLevel::Supervised < MaturityLevel::Autonomous);
        for (i, level) in MaturityLevel::ALL.iter().enumerate() {
            assert_eq!(level.index(), i);
            assert_eq!(MaturityLevel::from_index(i), Some(*level));
        }
    }

    #[test]
    fn next_stops_at_autonomous() {
        assert_eq!(MaturityLevel::Student.next(), Some(MaturityLevel::Intern));
        assert_eq!(MaturityLevel::Autonomous.next(), None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("supervised".parse(), Ok(MaturityLevel::Supervised));
        assert_eq!(" AUTONOMOUS ".parse(), Ok(MaturityLevel::Autonomous));
        assert!("expert".parse::<MaturityLevel>().is_err());
    }

    #[test]
    fn level_serializes_uppercase() {
        let json = serde_json::to_string(&MaturityLevel::Intern).unwrap();
        assert_eq!(json, "\"INTERN\"");
    }

    #[test]
    fn confidence_is_clamped() {
        let mut agent = AgentRecord::new("t", "a", "agent");
        agent.set_confidence(1.7);
        assert_eq!(agent.confidence_score(), 1.0);
        agent.set_confidence(-0.2);
        assert_eq!(agent.confidence_score(), 0.0);
        agent.set_confidence(f64::NAN);
        assert_eq!(agent.confidence_score(), 0.0);
    }

    #[test]
    fn cooldown_window() {
        let now = Utc::now();
        let mut agent = AgentRecord::new("t", "a", "agent");
        assert!(!agent.is_cooling_down(now));
        agent.exam_eligible_at = Some(now + chrono::Duration::hours(6));
        assert!(agent.is_cooling_down(now));
        assert!(!agent.is_cooling_down(now + chrono::Duration::hours(7)));
    }

    #[test]
    fn edge_case_visibility() {
        let global = EdgeCaseRecord::new("ec-1", "leak", "pii", None);
        let scoped = EdgeCaseRecord::new("ec-2", "refund", "financial", Some("acme".into()));
        assert!(global.is_visible_to("acme"));
        assert!(global.is_visible_to("globex"));
        assert!(scoped.is_visible_to("acme"));
        assert!(!scoped.is_visible_to("globex"));
    }
}
