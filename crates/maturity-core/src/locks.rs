//! Per-agent write serialization.
//!
//! Every component that reads an agent record, changes it and writes it
//! back holds the agent's lock across that sequence. Slots are weak, so a
//! lock lives only while someone holds or awaits it, and dead slots are
//! swept once the registry grows past its sweep mark.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type AgentKey = (String, String);

const INITIAL_SWEEP_MARK: usize = 1024;

/// Guard for one agent's lock. Dropping it releases the agent.
pub type AgentGuard = OwnedMutexGuard<()>;

/// Shared registry of per-agent async mutexes.
#[derive(Debug)]
pub struct AgentLocks {
    slots: DashMap<AgentKey, Weak<Mutex<()>>>,
    sweep_mark: AtomicUsize,
}

impl Default for AgentLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentLocks {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            sweep_mark: AtomicUsize::new(INITIAL_SWEEP_MARK),
        }
    }

    /// Wait for exclusive access to one agent.
    pub async fn lock(&self, tenant_id: &str, agent_id: &str) -> AgentGuard {
        self.sweep_if_needed();

        let mutex = {
            let mut slot = self
                .slots
                .entry((tenant_id.to_string(), agent_id.to_string()))
                .or_default();
            match slot.upgrade() {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(Mutex::new(()));
                    *slot = Arc::downgrade(&mutex);
                    mutex
                }
            }
        };
        mutex.lock_owned().await
    }

    /// Slots currently tracked, live or not yet swept.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop slots whose mutex nobody holds or awaits.
    pub fn sweep(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.strong_count() > 0);
        before.saturating_sub(self.slots.len())
    }

    fn sweep_if_needed(&self) {
        let mark = self.sweep_mark.load(Ordering::Relaxed);
        if self.slots.len() < mark {
            return;
        }
        let removed = self.sweep();
        // Live slots at the mark push it out so sweeps stay amortized.
        let next = (self.slots.len() * 2).max(INITIAL_SWEEP_MARK);
        self.sweep_mark.store(next, Ordering::Relaxed);
        tracing::debug!(removed, next_mark = next, "swept agent lock slots");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_agent_is_exclusive() {
        let locks = Arc::new(AgentLocks::new());
        let guard = locks.lock("acme", "a1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("acme", "a1").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_agents_do_not_block() {
        let locks = AgentLocks::new();
        let _a1 = locks.lock("acme", "a1").await;
        let _a2 = locks.lock("acme", "a2").await;
        let _other_tenant = locks.lock("globex", "a1").await;
        assert_eq!(locks.len(), 3);
    }

    #[tokio::test]
    async fn released_slots_are_swept() {
        let locks = AgentLocks::new();
        for i in 0..50 {
            let _guard = locks.lock("acme", &format!("agent-{i}")).await;
        }
        let held = locks.lock("acme", "agent-0").await;

        assert_eq!(locks.len(), 50);
        assert_eq!(locks.sweep(), 49);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert_eq!(locks.sweep(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn registry_stays_bounded_under_churn() {
        let locks = AgentLocks::new();
        for i in 0..(INITIAL_SWEEP_MARK * 3) {
            let _guard = locks.lock("acme", &format!("agent-{i}")).await;
        }
        assert!(locks.len() <= INITIAL_SWEEP_MARK + 1);
    }
}
