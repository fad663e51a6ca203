//! In-process governance decision cache.
//!
//! Decisions are memoized per `(tenant_id, agent_id, action_type)` in a
//! sharded concurrent map, so a miss on one key never blocks lookups of
//! another.
//!
//! Coherence with agent state relies on a per-agent generation counter:
//! readers capture [`GovernanceCache::generation`] *before* loading the
//! agent and pass it to [`GovernanceCache::put`]; writers call
//! [`GovernanceCache::invalidate`] before and after committing. A decision
//! computed from pre-commit state therefore carries a stale generation and
//! is never inserted.
//!
//! Generations are drawn from one monotonic epoch. An agent with no slot
//! reads the current floor, and raising the floor lets every slot be
//! dropped at once, so the generation map is emptied on [`GovernanceCache::clear`]
//! and whenever it outgrows `max_entries`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::domain::GovernanceDecision;
use crate::metrics::METRICS;
use crate::obs;

/// Cache key. Pure function of its three parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tenant_id: String,
    pub agent_id: String,
    pub action_type: String,
}

impl CacheKey {
    pub fn new(tenant_id: &str, agent_id: &str, action_type: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            agent_id: agent_id.to_string(),
            action_type: action_type.to_string(),
        }
    }

    fn belongs_to(&self, agent: &AgentKey) -> bool {
        self.tenant_id == agent.0 && self.agent_id == agent.1
    }
}

type AgentKey = (String, String);

fn agent_key(tenant_id: &str, agent_id: &str) -> AgentKey {
    (tenant_id.to_string(), agent_id.to_string())
}

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: GovernanceDecision,
    inserted_at: Instant,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe decision cache.
#[derive(Debug)]
pub struct GovernanceCache {
    entries: DashMap<CacheKey, CacheEntry>,
    generations: DashMap<AgentKey, u64>,
    epoch: AtomicU64,
    floor: AtomicU64,
    ttl: Option<Duration>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for GovernanceCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl GovernanceCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = (config.ttl_secs > 0).then(|| Duration::from_secs(config.ttl_secs));
        Self::with_ttl(ttl, config.max_entries)
    }

    /// Build with an explicit entry lifetime (`None` disables expiry).
    pub fn with_ttl(ttl: Option<Duration>, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            generations: DashMap::new(),
            epoch: AtomicU64::new(0),
            floor: AtomicU64::new(0),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current generation for an agent. Capture this before loading state.
    pub fn generation(&self, tenant_id: &str, agent_id: &str) -> u64 {
        self.generations
            .get(&agent_key(tenant_id, agent_id))
            .map(|g| *g)
            .unwrap_or_else(|| self.floor.load(Ordering::SeqCst))
    }

    /// Generation slots currently held.
    pub fn tracked_agents(&self) -> usize {
        self.generations.len()
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drop every generation slot. In-flight readers see a new floor and
    /// their pending inserts are refused.
    fn reset_generations(&self) {
        self.floor.store(self.next_epoch(), Ordering::SeqCst);
        self.generations.clear();
    }

    pub fn get(
        &self,
        tenant_id: &str,
        agent_id: &str,
        action_type: &str,
    ) -> Option<GovernanceDecision> {
        let key = CacheKey::new(tenant_id, agent_id, action_type);
        let hit = self
            .entries
            .get(&key)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.decision.clone());

        match hit {
            Some(decision) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                METRICS.inc_cache_hits();
                Some(decision)
            }
            None => {
                self.entries
                    .remove_if(&key, |_, entry| self.is_expired(entry));
                self.misses.fetch_add(1, Ordering::Relaxed);
                METRICS.inc_cache_misses();
                None
            }
        }
    }

    /// Insert a decision computed from state observed at `generation`.
    ///
    /// Returns `false` when the agent was invalidated since `generation`
    /// was captured, or when the cache is full.
    pub fn put(
        &self,
        tenant_id: &str,
        agent_id: &str,
        action_type: &str,
        decision: GovernanceDecision,
        generation: u64,
    ) -> bool {
        if self.generations.len() > self.max_entries {
            self.reset_generations();
        }

        // Holding the generation slot serializes this insert against
        // `invalidate` for the same agent.
        let slot = self
            .generations
            .entry(agent_key(tenant_id, agent_id))
            .or_insert_with(|| self.floor.load(Ordering::SeqCst));
        if *slot != generation {
            return false;
        }

        if self.entries.len() >= self.max_entries {
            self.prune_expired();
            if self.entries.len() >= self.max_entries {
                tracing::debug!(max_entries = self.max_entries, "governance cache full");
                return false;
            }
        }

        self.entries.insert(
            CacheKey::new(tenant_id, agent_id, action_type),
            CacheEntry {
                decision,
                inserted_at: Instant::now(),
            },
        );
        drop(slot);
        true
    }

    /// Drop every cached decision for one agent and advance its generation.
    pub fn invalidate(&self, tenant_id: &str, agent_id: &str) -> usize {
        let agent = agent_key(tenant_id, agent_id);
        {
            let mut slot = self.generations.entry(agent.clone()).or_insert(0);
            *slot = self.next_epoch();
        }

        let before = self.entries.len();
        self.entries.retain(|key, _| !key.belongs_to(&agent));
        let removed = before.saturating_sub(self.entries.len());

        METRICS.inc_invalidations();
        obs::emit_cache_invalidated(tenant_id, agent_id, removed);
        removed
    }

    /// Wipe the whole cache.
    pub fn clear(&self) {
        self.reset_generations();
        self.entries.clear();
        tracing::info!(event = "cache.cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl
            .map(|ttl| entry.inserted_at.elapsed() >= ttl)
            .unwrap_or(false)
    }

    fn prune_expired(&self) {
        if self.ttl.is_some() {
            self.entries.retain(|_, entry| !self.is_expired(entry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maturity_state::MaturityLevel;

    fn decision(allowed: bool) -> GovernanceDecision {
        GovernanceDecision {
            allowed,
            reason: "cached".to_string(),
            agent_status: MaturityLevel::Intern,
            action_complexity: 2,
            required_status: MaturityLevel::Intern,
            requires_human_approval: false,
            confidence_score: 0.6,
        }
    }

    #[test]
    fn key_is_deterministic_and_distinct() {
        assert_eq!(
            CacheKey::new("acme", "a1", "chat"),
            CacheKey::new("acme", "a1", "chat")
        );
        assert_ne!(
            CacheKey::new("acme", "a1", "chat"),
            CacheKey::new("acme", "a1", "delete")
        );
        assert_ne!(
            CacheKey::new("acme", "a1", "chat"),
            CacheKey::new("globex", "a1", "chat")
        );
    }

    #[test]
    fn put_then_get() {
        let cache = GovernanceCache::default();
        let generation = cache.generation("acme", "a1");
        assert!(cache.put("acme", "a1", "chat", decision(true), generation));
        assert_eq!(cache.get("acme", "a1", "chat"), Some(decision(true)));
        assert_eq!(cache.get("acme", "a1", "delete"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn invalidate_is_per_agent() {
        let cache = GovernanceCache::default();
        cache.put("acme", "a1", "chat", decision(true), 0);
        cache.put("acme", "a1", "read", decision(true), 0);
        cache.put("acme", "a2", "chat", decision(true), 0);
        cache.put("globex", "a1", "chat", decision(true), 0);

        assert_eq!(cache.invalidate("acme", "a1"), 2);
        assert_eq!(cache.get("acme", "a1", "chat"), None);
        assert!(cache.get("acme", "a2", "chat").is_some());
        assert!(cache.get("globex", "a1", "chat").is_some());
    }

    #[test]
    fn stale_generation_is_not_inserted() {
        let cache = GovernanceCache::default();
        let captured = cache.generation("acme", "a1");
        cache.invalidate("acme", "a1");

        assert!(!cache.put("acme", "a1", "chat", decision(true), captured));
        assert!(cache.is_empty());

        let fresh = cache.generation("acme", "a1");
        assert!(fresh > captured);
        assert!(cache.put("acme", "a1", "chat", decision(true), fresh));
    }

    #[test]
    fn clear_wipes_everything() {
        let cache = GovernanceCache::default();
        cache.put("acme", "a1", "chat", decision(true), 0);
        cache.put("acme", "a2", "chat", decision(true), 0);
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.put("acme", "a1", "chat", decision(true), 0));
    }

    #[test]
    fn clear_drops_generation_slots() {
        let cache = GovernanceCache::default();
        for i in 0..10 {
            let agent_id = format!("a{i}");
            cache.put("acme", &agent_id, "chat", decision(true), 0);
            cache.invalidate("acme", &agent_id);
        }
        assert_eq!(cache.tracked_agents(), 10);

        let captured = cache.generation("acme", "a3");
        cache.clear();
        assert_eq!(cache.tracked_agents(), 0);

        // Pre-clear readers stay stale, post-clear readers insert normally.
        assert!(!cache.put("acme", "a3", "chat", decision(true), captured));
        let fresh = cache.generation("acme", "a3");
        assert!(cache.put("acme", "a3", "chat", decision(true), fresh));
    }

    #[test]
    fn invalidation_after_clear_still_blocks_stale_reader() {
        let cache = GovernanceCache::default();
        cache.invalidate("acme", "a1");
        cache.clear();

        // Agent has no slot: the reader captures the floor.
        let captured = cache.generation("acme", "a1");
        cache.invalidate("acme", "a1");
        assert!(!cache.put("acme", "a1", "chat", decision(true), captured));
    }

    #[test]
    fn generation_slots_stay_bounded() {
        let cache = GovernanceCache::with_ttl(None, 8);
        for i in 0..100 {
            let agent_id = format!("a{i}");
            let generation = cache.generation("acme", &agent_id);
            cache.put("acme", &agent_id, "chat", decision(true), generation);
            cache.invalidate("acme", &agent_id);
        }
        assert!(cache.tracked_agents() <= 9);
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_skips_insert() {
        let cache = GovernanceCache::with_ttl(None, 2);
        assert!(cache.put("acme", "a1", "chat", decision(true), 0));
        assert!(cache.put("acme", "a1", "read", decision(true), 0));
        assert!(!cache.put("acme", "a1", "list", decision(true), 0));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = GovernanceCache::with_ttl(Some(Duration::from_secs(60)), 100);
        cache.put("acme", "a1", "chat", decision(true), 0);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(cache.get("acme", "a1", "chat").is_some());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cache.get("acme", "a1", "chat").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_prunes_expired_first() {
        let cache = GovernanceCache::with_ttl(Some(Duration::from_secs(10)), 1);
        cache.put("acme", "a1", "chat", decision(true), 0);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.put("acme", "a1", "read", decision(true), 0));
        assert_eq!(cache.len(), 1);
    }
}
