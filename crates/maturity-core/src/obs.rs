//! Structured observability hooks for governance events.
//!
//! Every event carries an `event` field so log pipelines can filter on it:
//! `governance.decision`, `confidence.updated`, `exam.started`,
//! `exam.stage_failed`, `exam.finished`, `promotion.recorded`,
//! `cache.invalidated`.

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ExamStage, GovernanceDecision};
use maturity_state::{MaturityLevel, PromotionHistoryEntry};

/// Span covering one exam run. Attach it to the exam future with
/// `tracing::Instrument::instrument`.
pub fn exam_span(exam_id: &Uuid, tenant_id: &str, agent_id: &str) -> tracing::Span {
    tracing::info_span!(
        "maturity.exam",
        exam_id = %exam_id,
        tenant_id = %tenant_id,
        agent_id = %agent_id,
    )
}

/// Emit event: a permission decision was computed.
pub fn emit_decision(tenant_id: &str, agent_id: &str, action_type: &str, decision: &GovernanceDecision) {
    info!(
        event = "governance.decision",
        tenant_id = %tenant_id,
        agent_id = %agent_id,
        action_type = %action_type,
        allowed = decision.allowed,
        complexity = decision.action_complexity,
        required_status = %decision.required_status,
        requires_human_approval = decision.requires_human_approval,
    );
}

pub fn emit_confidence_updated(
    tenant_id: &str,
    agent_id: &str,
    previous: f64,
    current: f64,
    positive: bool,
) {
    info!(
        event = "confidence.updated",
        tenant_id = %tenant_id,
        agent_id = %agent_id,
        previous = previous,
        current = current,
        positive = positive,
    );
}

pub fn emit_exam_started(exam_id: &Uuid, current: MaturityLevel, target: MaturityLevel) {
    info!(
        event = "exam.started",
        exam_id = %exam_id,
        current_level = %current,
        target_level = %target,
    );
}

/// Emit event: a stage could not be evaluated (warning level).
pub fn emit_stage_failed(exam_id: &Uuid, stage: ExamStage, error: &dyn std::fmt::Display) {
    warn!(event = "exam.stage_failed", exam_id = %exam_id, stage = %stage, error = %error);
}

pub fn emit_exam_finished(
    exam_id: &Uuid,
    passed: bool,
    promoted: bool,
    failure_reason: Option<&str>,
    duration_ms: u64,
) {
    info!(
        event = "exam.finished",
        exam_id = %exam_id,
        passed = passed,
        promoted = promoted,
        failure_reason = failure_reason.unwrap_or(""),
        duration_ms = duration_ms,
    );
}

pub fn emit_promotion_recorded(entry: &PromotionHistoryEntry) {
    info!(
        event = "promotion.recorded",
        tenant_id = %entry.tenant_id,
        agent_id = %entry.agent_id,
        from_level = %entry.from_level,
        to_level = %entry.to_level,
        promotion_type = entry.promotion_type.as_str(),
        promoted_by = entry.promoted_by.as_deref().unwrap_or(""),
    );
}

pub fn emit_cache_invalidated(tenant_id: &str, agent_id: &str, removed: usize) {
    info!(
        event = "cache.invalidated",
        tenant_id = %tenant_id,
        agent_id = %agent_id,
        removed = removed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_span_create() {
        let span = exam_span(&Uuid::new_v4(), "acme", "agent-1");
        let _entered = span.enter();
    }
}
