//! Manual promotion, demotion and the ledger they append to.

use std::sync::Arc;

use maturity_core::{
    FixtureCollaborators, GovernanceConfig, GovernanceEngine, MaturityLevel, PromotionType,
    StatusChangeOutcome,
};
use maturity_state::fakes::MemoryGovernanceStore;
use maturity_state::{AgentRecord, AgentRecordStore};

async fn engine_with(agent: AgentRecord) -> (Arc<MemoryGovernanceStore>, GovernanceEngine<MemoryGovernanceStore>) {
    let store = Arc::new(MemoryGovernanceStore::new());
    store.register(agent).await.unwrap();
    let engine = GovernanceEngine::new(store.clone(), GovernanceConfig::default()).unwrap();
    (store, engine)
}

#[tokio::test]
async fn manual_promotion_records_actor_and_justification() {
    let (store, engine) = engine_with(AgentRecord::new("acme", "a1", "Bot")).await;

    let outcome = engine
        .promotions
        .promote_agent_manually(
            "acme",
            "a1",
            "supervised",
            "alice",
            Some("pilot program".into()),
        )
        .await
        .unwrap();

    let entry = match outcome {
        StatusChangeOutcome::Applied { entry } => entry,
        other => panic!("expected applied change, got {other:?}"),
    };
    assert_eq!(entry.promotion_type, PromotionType::Manual);
    assert_eq!(entry.from_level, MaturityLevel::Student);
    assert_eq!(entry.to_level, MaturityLevel::Supervised);
    assert_eq!(entry.promoted_by.as_deref(), Some("alice"));
    assert_eq!(entry.justification.as_deref(), Some("pilot program"));
    assert!(entry.exam_id.is_none());

    let agent = store.get("acme", "a1").await.unwrap();
    assert_eq!(agent.status, MaturityLevel::Supervised);
    assert_eq!(agent.promotion_count, 1);
    assert_eq!(agent.last_promotion_at, Some(entry.promoted_at));
}

#[tokio::test]
async fn demotion_guard_covers_every_pair() {
    for current in MaturityLevel::ALL {
        for target in MaturityLevel::ALL {
            let agent = AgentRecord::new("acme", "a1", "Bot").with_status(current);
            let (store, engine) = engine_with(agent).await;

            let outcome = engine
                .promotions
                .demote_agent("acme", "a1", target.as_str(), "admin", None)
                .await
                .unwrap();
            let stored = store.get("acme", "a1").await.unwrap();

            if target.index() < current.index() {
                assert!(outcome.is_applied(), "{current} -> {target}");
                assert_eq!(stored.status, target);
                assert_eq!(store.promotion_count(), 1);
            } else {
                match outcome {
                    StatusChangeOutcome::Rejected { reason } => {
                        assert!(reason.contains("cannot demote to equal or higher level"))
                    }
                    other => panic!("{current} -> {target}: expected rejection, got {other:?}"),
                }
                assert_eq!(stored.status, current);
                assert_eq!(store.promotion_count(), 0);
            }
        }
    }
}

#[tokio::test]
async fn history_is_newest_first_and_limited() {
    let (_store, engine) = engine_with(AgentRecord::new("acme", "a1", "Bot")).await;
    let promotions = &engine.promotions;

    promotions
        .promote_agent_manually("acme", "a1", "INTERN", "admin", None)
        .await
        .unwrap();
    promotions
        .promote_agent_manually("acme", "a1", "AUTONOMOUS", "admin", None)
        .await
        .unwrap();
    promotions
        .demote_agent("acme", "a1", "SUPERVISED", "admin", Some("incident".into()))
        .await
        .unwrap();

    let history = promotions.history("acme", "a1", 10).await.unwrap();
    let kinds: Vec<_> = history.iter().map(|e| e.promotion_type).collect();
    assert_eq!(
        kinds,
        vec![
            PromotionType::Demotion,
            PromotionType::Manual,
            PromotionType::Manual
        ]
    );
    for pair in history.windows(2) {
        assert!(pair[0].promoted_at >= pair[1].promoted_at);
    }

    let limited = promotions.history("acme", "a1", 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].promotion_type, PromotionType::Demotion);
}

#[tokio::test]
async fn summary_includes_latest_exam() {
    let agent = AgentRecord::new("acme", "a1", "Bot")
        .with_status(MaturityLevel::Intern)
        .with_confidence(0.72);
    let (_store, engine) = engine_with(agent).await;
    let fixture = Arc::new(FixtureCollaborators::passing());
    let pipeline = engine.exam_pipeline(fixture.clone(), fixture);

    pipeline.promote_via_exam("acme", "a1", None).await.unwrap();

    let summary = engine.promotions.promotion_summary("acme", "a1").await.unwrap();
    assert_eq!(summary.current_level, MaturityLevel::Supervised);
    assert_eq!(summary.display_status, MaturityLevel::Supervised);
    assert_eq!(summary.promotion_count, 1);
    let exam = summary.latest_exam.unwrap();
    assert!(exam.passed);
    assert_eq!(summary.recent_history.len(), 1);
    assert_eq!(summary.recent_history[0].exam_id, Some(exam.exam_id));
}
