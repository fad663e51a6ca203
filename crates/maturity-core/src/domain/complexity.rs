//! Action complexity tiers and the known action vocabulary.

use serde::{Deserialize, Serialize};

use maturity_state::MaturityLevel;

/// Risk tier of an action, 1 (read-only) through 4 (critical).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionComplexity {
    /// Read, search and present.
    Observe,
    /// Conversational and analytical output.
    Converse,
    /// State-changing work such as form submission.
    Mutate,
    /// Destructive, irreversible, financial or code-execution actions.
    Critical,
}

impl ActionComplexity {
    pub const ALL: [ActionComplexity; 4] = [
        ActionComplexity::Observe,
        ActionComplexity::Converse,
        ActionComplexity::Mutate,
        ActionComplexity::Critical,
    ];

    /// Numeric tier, 1..=4.
    pub fn tier(self) -> u8 {
        match self {
            Self::Observe => 1,
            Self::Converse => 2,
            Self::Mutate => 3,
            Self::Critical => 4,
        }
    }

    /// Minimum maturity needed to perform actions of this tier.
    pub fn required_status(self) -> MaturityLevel {
        match self {
            Self::Observe => MaturityLevel::Student,
            Self::Converse => MaturityLevel::Intern,
            Self::Mutate => MaturityLevel::Supervised,
            Self::Critical => MaturityLevel::Autonomous,
        }
    }

    /// Highest tier an agent at `level` may invoke.
    pub fn max_for(level: MaturityLevel) -> Self {
        Self::ALL[level.index()]
    }
}

impl std::fmt::Display for ActionComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observe => write!(f, "observe"),
            Self::Converse => write!(f, "converse"),
            Self::Mutate => write!(f, "mutate"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

use ActionComplexity::*;

/// Known action names, grouped by tier.
pub const ACTION_VOCABULARY: &[(&str, ActionComplexity)] = &[
    ("read", Observe),
    ("search", Observe),
    ("list", Observe),
    ("present", Observe),
    ("view", Observe),
    ("get", Observe),
    ("fetch", Observe),
    ("chat", Converse),
    ("stream_chat", Converse),
    ("stream", Converse),
    ("analyze", Converse),
    ("summarize", Converse),
    ("suggest", Converse),
    ("draft", Converse),
    ("create", Mutate),
    ("update", Mutate),
    ("submit_form", Mutate),
    ("submit", Mutate),
    ("send_email", Mutate),
    ("send", Mutate),
    ("write", Mutate),
    ("modify", Mutate),
    ("upload", Mutate),
    ("schedule", Mutate),
    ("delete", Critical),
    ("execute", Critical),
    ("execute_command", Critical),
    ("execute_script", Critical),
    ("deploy", Critical),
    ("payment", Critical),
    ("approve", Critical),
    ("transfer", Critical),
    ("refund", Critical),
    ("drop", Critical),
];

fn lookup(name: &str) -> Option<ActionComplexity> {
    ACTION_VOCABULARY
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, tier)| *tier)
}

/// Classify an action type into a complexity tier.
///
/// Exact vocabulary match first (case-insensitive, `-` treated as `_`),
/// then the highest tier among the known tokens of the name, so
/// `delete_user` is critical. Unrecognised actions fall back to
/// [`ActionComplexity::Observe`].
pub fn classify(action_type: &str) -> ActionComplexity {
    let normalized = action_type.trim().to_ascii_lowercase().replace('-', "_");
    if let Some(tier) = lookup(&normalized) {
        return tier;
    }

    normalized
        .split(|c: char| matches!(c, '_' | '.' | ':' | '/') || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .filter_map(lookup)
        .max()
        .unwrap_or(Observe)
}

/// Whether `action_type` resolves through the vocabulary (exactly or by
/// token) rather than the fail-open default.
pub fn is_known(action_type: &str) -> bool {
    let normalized = action_type.trim().to_ascii_lowercase().replace('-', "_");
    lookup(&normalized).is_some()
        || normalized
            .split(|c: char| matches!(c, '_' | '.' | ':' | '/') || c.is_whitespace())
            .any(|token| lookup(token).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_map_to_ladder() {
        assert_eq!(Observe.required_status(), MaturityLevel::Student);
        assert_eq!(Converse.required_status(), MaturityLevel::Intern);
        assert_eq!(Mutate.required_status(), MaturityLevel::Supervised);
        assert_eq!(Critical.required_status(), MaturityLevel::Autonomous);
        for (i, tier) in ActionComplexity::ALL.iter().enumerate() {
            assert_eq!(tier.tier() as usize, i + 1);
        }
    }

    #[test]
    fn exact_names() {
        assert_eq!(classify("delete"), Critical);
        assert_eq!(classify("execute-command"), Critical);
        assert_eq!(classify("execute_script"), Critical);
        assert_eq!(classify("payment"), Critical);
        assert_eq!(classify("stream_chat"), Converse);
        assert_eq!(classify("submit_form"), Mutate);
        assert_eq!(classify("present"), Observe);
        assert_eq!(classify("SEARCH"), Observe);
    }

    #[test]
    fn token_match_takes_highest_tier() {
        assert_eq!(classify("delete_user"), Critical);
        assert_eq!(classify("read_then_delete"), Critical);
        assert_eq!(classify("crm.update"), Mutate);
        assert_eq!(classify("billing:payment"), Critical);
        assert_eq!(classify("chat/summarize"), Converse);
    }

    #[test]
    fn unknown_actions_fail_open() {
        assert_eq!(classify("frobnicate"), Observe);
        assert_eq!(classify(""), Observe);
        assert!(!is_known("frobnicate"));
        assert!(is_known("delete_user"));
    }

    #[test]
    fn max_for_level() {
        assert_eq!(ActionComplexity::max_for(MaturityLevel::Student), Observe);
        assert_eq!(ActionComplexity::max_for(MaturityLevel::Autonomous), Critical);
    }

    #[test]
    fn vocabulary_names_are_unique() {
        let mut names: Vec<&str> = ACTION_VOCABULARY.iter().map(|(n, _)| *n).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ACTION_VOCABULARY.len());
    }
}
