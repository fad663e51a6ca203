//! Concurrent permission checks racing score updates.

use std::sync::Arc;

use maturity_core::{GovernanceConfig, GovernanceEngine, Impact, MaturityLevel};
use maturity_state::fakes::MemoryGovernanceStore;
use maturity_state::{AgentRecord, AgentRecordStore};

async fn engine(agents: usize) -> Arc<GovernanceEngine<MemoryGovernanceStore>> {
    let store = Arc::new(MemoryGovernanceStore::new());
    for i in 0..agents {
        store
            .register(
                AgentRecord::new("acme", format!("agent-{i}"), "bot")
                    .with_status(MaturityLevel::Intern),
            )
            .await
            .unwrap();
    }
    Arc::new(GovernanceEngine::new(store, GovernanceConfig::default()).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checks_across_agents_agree() {
    let engine = engine(8).await;
    let mut handles = Vec::new();

    for i in 0..8 {
        for action in ["read", "chat", "submit_form", "delete"] {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let agent_id = format!("agent-{i}");
                let d = engine
                    .policy
                    .can_perform_action("acme", &agent_id, action)
                    .await
                    .unwrap();
                (action, d.allowed)
            }));
        }
    }

    for handle in handles {
        let (action, allowed) = handle.await.unwrap();
        assert_eq!(allowed, matches!(action, "read" | "chat"), "{action}");
    }
    assert_eq!(engine.cache().len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_are_not_lost() {
    let engine = engine(1).await;
    let mut handles = Vec::new();

    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .confidence
                .update_confidence("acme", "agent-0", true, Impact::Low)
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let agent = engine.store().get("acme", "agent-0").await.unwrap();
    assert!((agent.confidence_score() - 0.70).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn no_stale_decision_after_update_commits() {
    let engine = engine(1).await;

    // Warm the cache with the pre-update decision.
    let before = engine
        .policy
        .can_perform_action("acme", "agent-0", "read")
        .await
        .unwrap();

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for _ in 0..20 {
                    engine
                        .policy
                        .can_perform_action("acme", "agent-0", "read")
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let update = engine
        .confidence
        .update_confidence("acme", "agent-0", false, Impact::High)
        .await
        .unwrap();

    let after = engine
        .policy
        .can_perform_action("acme", "agent-0", "read")
        .await
        .unwrap();
    assert_ne!(after.confidence_score, before.confidence_score);
    assert!((after.confidence_score - update.current).abs() < 1e-12);

    for reader in readers {
        reader.await.unwrap();
    }

    let settled = engine
        .policy
        .can_perform_action("acme", "agent-0", "read")
        .await
        .unwrap();
    assert!((settled.confidence_score - update.current).abs() < 1e-12);
}
