//! Permission policy: maturity-gated authorization of agent actions.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::cache::GovernanceCache;
use crate::domain::complexity::{classify, is_known, ActionComplexity, ACTION_VOCABULARY};
use crate::domain::{
    AgentCapabilities, EnforcementResult, GovernanceDecision, GovernanceError, Result,
};
use crate::metrics::METRICS;
use crate::obs;
use maturity_state::{AgentRecord, AgentRecordStore, MaturityLevel, UserDirectory};

/// Roles that may read any agent's data.
pub const ADMIN_ROLES: [&str; 2] = ["super_admin", "workspace_admin"];

/// Render a decision for `agent` performing an action of `complexity`.
pub fn decide(agent: &AgentRecord, complexity: ActionComplexity) -> GovernanceDecision {
    let required_status = complexity.required_status();
    let allowed = agent.status >= required_status;

    // Supervised agents need sign-off for state-changing work.
    let requires_human_approval = !allowed
        || (agent.status == MaturityLevel::Supervised && complexity == ActionComplexity::Mutate);

    let reason = if allowed {
        format!(
            "agent {} ({}) may perform {} actions (tier {})",
            agent.agent_id,
            agent.status,
            complexity,
            complexity.tier()
        )
    } else {
        format!(
            "agent {} lacks maturity: status {} but tier {} actions require {}",
            agent.agent_id,
            agent.status,
            complexity.tier(),
            required_status
        )
    };

    GovernanceDecision {
        allowed,
        reason,
        agent_status: agent.status,
        action_complexity: complexity.tier(),
        required_status,
        requires_human_approval,
        confidence_score: agent.confidence_score(),
    }
}

/// Capabilities of an agent at its current level.
pub fn capabilities_for(agent: &AgentRecord) -> AgentCapabilities {
    let max = ActionComplexity::max_for(agent.status);
    let (allowed, restricted): (Vec<_>, Vec<_>) =
        ACTION_VOCABULARY.iter().partition(|(_, tier)| *tier <= max);

    AgentCapabilities {
        agent_id: agent.agent_id.clone(),
        maturity_level: agent.status,
        confidence_score: agent.confidence_score(),
        max_complexity: max.tier(),
        allowed_actions: allowed.into_iter().map(|(n, _)| n.to_string()).collect(),
        restricted_actions: restricted.into_iter().map(|(n, _)| n.to_string()).collect(),
    }
}

/// The governance service consulted on every agent action.
pub struct PermissionPolicy {
    agents: Arc<dyn AgentRecordStore>,
    users: Arc<dyn UserDirectory>,
    cache: Arc<GovernanceCache>,
}

impl PermissionPolicy {
    pub fn new(
        agents: Arc<dyn AgentRecordStore>,
        users: Arc<dyn UserDirectory>,
        cache: Arc<GovernanceCache>,
    ) -> Self {
        Self {
            agents,
            users,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<GovernanceCache> {
        &self.cache
    }

    /// Decide whether an agent may perform `action_type`. Cache first.
    ///
    /// An unknown agent is an error, never a denial.
    #[instrument(skip(self))]
    pub async fn can_perform_action(
        &self,
        tenant_id: &str,
        agent_id: &str,
        action_type: &str,
    ) -> Result<GovernanceDecision> {
        if let Some(hit) = self.cache.get(tenant_id, agent_id, action_type) {
            debug!("decision served from cache");
            return Ok(hit);
        }

        let generation = self.cache.generation(tenant_id, agent_id);
        let agent = self.agents.get(tenant_id, agent_id).await?;
        if !is_known(action_type) {
            debug!("unclassified action; treated as tier 1");
        }
        let decision = decide(&agent, classify(action_type));

        self.cache.put(
            tenant_id,
            agent_id,
            action_type,
            decision.clone(),
            generation,
        );

        METRICS.inc_decisions();
        obs::emit_decision(tenant_id, agent_id, action_type, &decision);
        Ok(decision)
    }

    /// Turn a decision into a proceed/block verdict.
    pub async fn enforce_action(
        &self,
        tenant_id: &str,
        agent_id: &str,
        action_type: &str,
    ) -> Result<EnforcementResult> {
        let decision = self
            .can_perform_action(tenant_id, agent_id, action_type)
            .await?;
        Ok(EnforcementResult::from_decision(&decision))
    }

    pub async fn get_agent_capabilities(
        &self,
        tenant_id: &str,
        agent_id: &str,
    ) -> Result<AgentCapabilities> {
        let agent = self.agents.get(tenant_id, agent_id).await?;
        Ok(capabilities_for(&agent))
    }

    /// Whether `user_id` may read data belonging to `agent_id`.
    ///
    /// Admin roles always may; other users only when their specialty
    /// matches the agent's category. Unknown users or agents get `false`.
    #[instrument(skip(self))]
    pub async fn can_access_agent_data(
        &self,
        tenant_id: &str,
        user_id: &str,
        agent_id: &str,
    ) -> Result<bool> {
        let Some(user) = self.users.get_user(user_id).await? else {
            debug!("unknown user");
            return Ok(false);
        };

        if ADMIN_ROLES.contains(&user.role.as_str()) {
            return Ok(true);
        }

        let agent = match self.agents.get(tenant_id, agent_id).await {
            Ok(agent) => agent,
            Err(err) => match GovernanceError::from(err) {
                GovernanceError::AgentNotFound { .. } => return Ok(false),
                other => return Err(other),
            },
        };

        Ok(matches!(
            (user.specialty.as_deref(), agent.category.as_deref()),
            (Some(specialty), Some(category)) if specialty == category
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(status: MaturityLevel) -> AgentRecord {
        AgentRecord::new("acme", "a1", "Bot").with_status(status)
    }

    #[test]
    fn critical_requires_autonomous() {
        for level in MaturityLevel::ALL {
            let d = decide(&agent(level), ActionComplexity::Critical);
            assert_eq!(d.allowed, level == MaturityLevel::Autonomous);
            assert_eq!(d.required_status, MaturityLevel::Autonomous);
        }
    }

    #[test]
    fn denial_reason_names_requirement() {
        let d = decide(&agent(MaturityLevel::Student), ActionComplexity::Converse);
        assert!(!d.allowed);
        assert!(d.reason.contains("lacks maturity"));
        assert!(d.reason.contains("INTERN"));
        assert!(d.requires_human_approval);
    }

    #[test]
    fn supervised_mutations_need_approval() {
        let d = decide(&agent(MaturityLevel::Supervised), ActionComplexity::Mutate);
        assert!(d.allowed);
        assert!(d.requires_human_approval);

        let d = decide(&agent(MaturityLevel::Autonomous), ActionComplexity::Mutate);
        assert!(d.allowed);
        assert!(!d.requires_human_approval);

        let d = decide(&agent(MaturityLevel::Supervised), ActionComplexity::Converse);
        assert!(!d.requires_human_approval);
    }

    #[test]
    fn confidence_is_carried_through() {
        let a = agent(MaturityLevel::Intern).with_confidence(0.73);
        let d = decide(&a, ActionComplexity::Observe);
        assert!((d.confidence_score - 0.73).abs() < 1e-12);
    }

    #[test]
    fn capabilities_partition_vocabulary() {
        for level in MaturityLevel::ALL {
            let caps = capabilities_for(&agent(level));
            assert_eq!(
                caps.allowed_actions.len() + caps.restricted_actions.len(),
                ACTION_VOCABULARY.len()
            );
            for action in &caps.allowed_actions {
                assert!(!caps.restricted_actions.contains(action));
            }
            assert_eq!(caps.max_complexity as usize, level.index() + 1);
        }
        let autonomous = capabilities_for(&agent(MaturityLevel::Autonomous));
        assert!(autonomous.restricted_actions.is_empty());
    }
}
