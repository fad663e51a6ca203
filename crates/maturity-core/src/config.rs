//! Governance engine configuration.
//!
//! Every knob has a default matching production behaviour. Values can be
//! loaded from JSON (missing fields fall back to defaults) and overridden
//! from `MATURITY_*` environment variables.

use serde::{Deserialize, Serialize};

use crate::domain::error::{GovernanceError, Result};
use maturity_state::MaturityLevel;

/// Largest single-event score change allowed, as a fraction of the range.
pub const MAX_SCORE_DELTA: f64 = 0.30;

/// Confidence score deltas per feedback polarity and impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub positive_low: f64,
    pub positive_high: f64,
    pub negative_low: f64,
    pub negative_high: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            positive_low: 0.01,
            positive_high: 0.05,
            negative_low: 0.02,
            negative_high: 0.10,
        }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, delta) in [
            ("positive_low", self.positive_low),
            ("positive_high", self.positive_high),
            ("negative_low", self.negative_low),
            ("negative_high", self.negative_high),
        ] {
            if !(delta > 0.0 && delta <= MAX_SCORE_DELTA) {
                return Err(GovernanceError::InvalidConfig(format!(
                    "score.{name} must be in (0, {MAX_SCORE_DELTA}], got {delta}"
                )));
            }
        }
        if self.positive_high < self.positive_low {
            return Err(GovernanceError::InvalidConfig(
                "score.positive_high must be >= score.positive_low".to_string(),
            ));
        }
        if self.negative_high < self.negative_low {
            return Err(GovernanceError::InvalidConfig(
                "score.negative_high must be >= score.negative_low".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decision cache sizing and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds; 0 disables expiry.
    pub ttl_secs: u64,
    /// Upper bound on cached decisions across all agents.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            max_entries: 10_000,
        }
    }
}

/// Minimum per-skill success rate required to graduate into each level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillSuccessMinimums {
    pub student: f64,
    pub intern: f64,
    pub supervised: f64,
    pub autonomous: f64,
}

impl Default for SkillSuccessMinimums {
    fn default() -> Self {
        Self {
            student: 0.50,
            intern: 0.65,
            supervised: 0.75,
            autonomous: 0.85,
        }
    }
}

impl SkillSuccessMinimums {
    pub fn for_level(&self, level: MaturityLevel) -> f64 {
        match level {
            MaturityLevel::Student => self.student,
            MaturityLevel::Intern => self.intern,
            MaturityLevel::Supervised => self.supervised,
            MaturityLevel::Autonomous => self.autonomous,
        }
    }
}

/// Graduation exam parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    /// Recent episodes analysed by the readiness and constitutional stages.
    pub episode_count: usize,
    /// Maximum active edge cases replayed per exam.
    pub edge_case_limit: usize,
    /// Per-case simulator time budget.
    pub simulation_timeout_ms: u64,
    /// Cooldown applied after a failed exam.
    pub cooldown_hours: i64,
    pub min_skill_mastery: f64,
    pub skill_success_minimums: SkillSuccessMinimums,
    /// Episodes scoring below this are constitutional violations.
    pub constitutional_threshold: f64,
    /// Violations scoring below this are high severity.
    pub high_severity_threshold: f64,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            episode_count: 30,
            edge_case_limit: 5,
            simulation_timeout_ms: 30_000,
            cooldown_hours: 6,
            min_skill_mastery: 0.5,
            skill_success_minimums: SkillSuccessMinimums::default(),
            constitutional_threshold: 0.95,
            high_severity_threshold: 0.80,
        }
    }
}

impl ExamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.episode_count == 0 {
            return Err(GovernanceError::InvalidConfig(
                "exam.episode_count must be positive".to_string(),
            ));
        }
        if self.simulation_timeout_ms == 0 {
            return Err(GovernanceError::InvalidConfig(
                "exam.simulation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.cooldown_hours < 0 {
            return Err(GovernanceError::InvalidConfig(
                "exam.cooldown_hours must not be negative".to_string(),
            ));
        }
        let minimums = &self.skill_success_minimums;
        for (name, value) in [
            ("min_skill_mastery", self.min_skill_mastery),
            ("constitutional_threshold", self.constitutional_threshold),
            ("high_severity_threshold", self.high_severity_threshold),
            ("skill_success_minimums.student", minimums.student),
            ("skill_success_minimums.intern", minimums.intern),
            ("skill_success_minimums.supervised", minimums.supervised),
            ("skill_success_minimums.autonomous", minimums.autonomous),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GovernanceError::InvalidConfig(format!(
                    "exam.{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.high_severity_threshold > self.constitutional_threshold {
            return Err(GovernanceError::InvalidConfig(
                "exam.high_severity_threshold must not exceed exam.constitutional_threshold"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for the governance engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub score: ScoreConfig,
    pub cache: CacheConfig,
    pub exam: ExamConfig,
}

impl GovernanceConfig {
    pub fn validate(&self) -> Result<()> {
        self.score.validate()?;
        self.exam.validate()
    }

    /// Defaults overridden by environment variables, then validated.
    ///
    /// Reads:
    /// - MATURITY_CACHE_TTL_SECS
    /// - MATURITY_CACHE_MAX_ENTRIES
    /// - MATURITY_EXAM_EPISODE_COUNT
    /// - MATURITY_EXAM_EDGE_CASE_LIMIT
    /// - MATURITY_EXAM_COOLDOWN_HOURS
    /// - MATURITY_SIMULATION_TIMEOUT_MS
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply `MATURITY_*` overrides on top of `self`, then validate.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = parse_var(&lookup, "MATURITY_CACHE_TTL_SECS")? {
            self.cache.ttl_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "MATURITY_CACHE_MAX_ENTRIES")? {
            self.cache.max_entries = v;
        }
        if let Some(v) = parse_var(&lookup, "MATURITY_EXAM_EPISODE_COUNT")? {
            self.exam.episode_count = v;
        }
        if let Some(v) = parse_var(&lookup, "MATURITY_EXAM_EDGE_CASE_LIMIT")? {
            self.exam.edge_case_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "MATURITY_EXAM_COOLDOWN_HOURS")? {
            self.exam.cooldown_hours = v;
        }
        if let Some(v) = parse_var(&lookup, "MATURITY_SIMULATION_TIMEOUT_MS")? {
            self.exam.simulation_timeout_ms = v;
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            GovernanceError::InvalidConfig(format!("{key}='{raw}' is not valid: {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = GovernanceConfig::default();
        config.validate().unwrap();
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.exam.episode_count, 30);
        assert_eq!(config.exam.edge_case_limit, 5);
        assert_eq!(config.exam.cooldown_hours, 6);
    }

    #[test]
    fn rejects_delta_above_thirty_percent() {
        let mut config = GovernanceConfig::default();
        config.score.negative_high = 0.31;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("negative_high"));
    }

    #[test]
    fn rejects_high_below_low() {
        let mut config = GovernanceConfig::default();
        config.score.positive_high = 0.005;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_delta() {
        let mut config = GovernanceConfig::default();
        config.score.positive_low = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn skill_minimums_by_level() {
        let minimums = SkillSuccessMinimums::default();
        assert_eq!(minimums.for_level(MaturityLevel::Student), 0.50);
        assert_eq!(minimums.for_level(MaturityLevel::Intern), 0.65);
        assert_eq!(minimums.for_level(MaturityLevel::Supervised), 0.75);
        assert_eq!(minimums.for_level(MaturityLevel::Autonomous), 0.85);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: GovernanceConfig =
            serde_json::from_str(r#"{"cache": {"ttl_secs": 0}, "exam": {"cooldown_hours": 12}}"#)
                .unwrap();
        assert_eq!(config.cache.ttl_secs, 0);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.exam.cooldown_hours, 12);
        assert_eq!(config.exam.episode_count, 30);
        assert_eq!(config.score, ScoreConfig::default());
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("MATURITY_CACHE_TTL_SECS", "5"),
            ("MATURITY_EXAM_COOLDOWN_HOURS", "24"),
            ("MATURITY_SIMULATION_TIMEOUT_MS", "250"),
        ]
        .into_iter()
        .collect();
        let config = GovernanceConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.exam.cooldown_hours, 24);
        assert_eq!(config.exam.simulation_timeout_ms, 250);
        assert_eq!(config.exam.episode_count, 30);
    }

    #[test]
    fn env_override_rejects_garbage() {
        let err = GovernanceConfig::default()
            .with_overrides(|k| (k == "MATURITY_EXAM_EPISODE_COUNT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MATURITY_EXAM_EPISODE_COUNT"));
    }
}
