//! Permission decision result types.

use serde::{Deserialize, Serialize};

use maturity_state::MaturityLevel;

/// Outcome of a single permission check. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub allowed: bool,
    /// Human-readable explanation; on denial it names the unmet requirement.
    pub reason: String,
    pub agent_status: MaturityLevel,
    /// Tier 1..=4.
    pub action_complexity: u8,
    pub required_status: MaturityLevel,
    pub requires_human_approval: bool,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementStatus {
    Approved,
    /// Allowed, but a human must sign off before the action runs.
    PendingApproval,
    Blocked,
}

/// Follow-up the caller must perform before (or instead of) proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionRequired {
    HumanApproval,
    WaitForApproval,
}

/// Enforcement verdict derived from a [`GovernanceDecision`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforcementResult {
    pub proceed: bool,
    pub status: EnforcementStatus,
    pub reason: String,
    pub action_required: Option<ActionRequired>,
}

impl EnforcementResult {
    pub fn from_decision(decision: &GovernanceDecision) -> Self {
        if !decision.allowed {
            Self {
                proceed: false,
                status: EnforcementStatus::Blocked,
                reason: decision.reason.clone(),
                action_required: Some(ActionRequired::HumanApproval),
            }
        } else if decision.requires_human_approval {
            Self {
                proceed: true,
                status: EnforcementStatus::PendingApproval,
                reason: decision.reason.clone(),
                action_required: Some(ActionRequired::WaitForApproval),
            }
        } else {
            Self {
                proceed: true,
                status: EnforcementStatus::Approved,
                reason: decision.reason.clone(),
                action_required: None,
            }
        }
    }
}

/// What an agent may do at its current maturity level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub agent_id: String,
    pub maturity_level: MaturityLevel,
    pub confidence_score: f64,
    /// Highest tier the agent may invoke, 1..=4.
    pub max_complexity: u8,
    pub allowed_actions: Vec<String>,
    pub restricted_actions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(allowed: bool, approval: bool) -> GovernanceDecision {
        GovernanceDecision {
            allowed,
            reason: "test".to_string(),
            agent_status: MaturityLevel::Supervised,
            action_complexity: 3,
            required_status: MaturityLevel::Supervised,
            requires_human_approval: approval,
            confidence_score: 0.8,
        }
    }

    #[test]
    fn denied_is_blocked() {
        let result = EnforcementResult::from_decision(&decision(false, true));
        assert!(!result.proceed);
        assert_eq!(result.status, EnforcementStatus::Blocked);
        assert_eq!(result.action_required, Some(ActionRequired::HumanApproval));
    }

    #[test]
    fn allowed_with_approval_waits() {
        let result = EnforcementResult::from_decision(&decision(true, true));
        assert!(result.proceed);
        assert_eq!(result.status, EnforcementStatus::PendingApproval);
        assert_eq!(result.action_required, Some(ActionRequired::WaitForApproval));
    }

    #[test]
    fn allowed_without_approval_is_approved() {
        let result = EnforcementResult::from_decision(&decision(true, false));
        assert!(result.proceed);
        assert_eq!(result.status, EnforcementStatus::Approved);
        assert_eq!(result.action_required, None);
    }

    #[test]
    fn decision_serializes_status_uppercase() {
        let json = serde_json::to_value(decision(true, false)).unwrap();
        assert_eq!(json["agent_status"], "SUPERVISED");
        assert_eq!(json["action_complexity"], 3);
    }
}
