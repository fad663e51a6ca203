//! Domain types for the governance engine.
//!
//! - `complexity`: action tiers and the known action vocabulary
//! - `decision`: permission check and enforcement results
//! - `exam`: graduation exam and status-change outcomes
//! - `error`: the error taxonomy

pub mod complexity;
pub mod decision;
pub mod error;
pub mod exam;

pub use complexity::{classify, ActionComplexity, ACTION_VOCABULARY};
pub use decision::{
    ActionRequired, AgentCapabilities, EnforcementResult, EnforcementStatus, GovernanceDecision,
};
pub use error::{GovernanceError, Result};
pub use exam::{
    Eligibility, ExamOutcome, ExamReport, ExamStage, StageFailure, StatusChangeOutcome,
};
