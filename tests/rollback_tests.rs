/// Rollback tests
///
/// Covers rollback after a completed cutover, both mid-flight routing
/// outcomes, rollback from failed, idempotence, and audit-event ordering.
/// Run with: cargo test --test rollback_tests

use std::sync::Arc;
use tenantshift::{
    InMemoryDataPlane, MigrationError, MigrationEventType, MigrationOrchestrator, MigrationStatus,
    RoutingMode, SourceRow,
};

const SOURCE: &str = "leads_ohio";
const TARGET: &str = "genesis.leads_p_ws1";

fn lead(n: u32) -> SourceRow {
    let mut fields = serde_json::Map::new();
    fields.insert("email".to_string(), serde_json::json!(format!("lead{}@acme.io", n)));
    SourceRow {
        id: format!("lead-{:04}", n),
        tenant: "ws-1".to_string(),
        fields,
    }
}

async fn seeded_orchestrator(count: u32) -> (Arc<InMemoryDataPlane>, MigrationOrchestrator) {
    let plane = Arc::new(InMemoryDataPlane::new());
    plane
        .seed_source_rows(SOURCE, (1..=count).map(lead).collect())
        .await;
    let orchestrator = MigrationOrchestrator::with_defaults(plane.clone());
    orchestrator
        .create_migration("ws-1", SOURCE, TARGET)
        .await
        .unwrap();
    (plane, orchestrator)
}

#[tokio::test]
async fn rollback_after_completed_cutover_reverts_to_legacy() {
    let (_plane, orchestrator) = seeded_orchestrator(50).await;
    orchestrator.begin_dual_write("ws-1").await.unwrap();
    orchestrator.run_backfill("ws-1").await.unwrap();
    orchestrator.verify_parity("ws-1").await.unwrap();
    let cutover = orchestrator.execute_cutover("ws-1").await.unwrap();
    assert!(cutover.success);

    let result = orchestrator.rollback("ws-1").await.unwrap();

    assert!(result.success);
    assert!(result.duration_ms > 0);
    let state = orchestrator.state("ws-1").await.unwrap();
    assert_eq!(state.status, MigrationStatus::RolledBack);
    // Legacy store is the single authority again.
    assert_eq!(state.routing_mode, RoutingMode::Single);
    assert!(!state.dual_write_enabled);
}

#[tokio::test]
async fn rollback_events_are_ordered() {
    let (_plane, orchestrator) = seeded_orchestrator(20).await;
    orchestrator.begin_dual_write("ws-1").await.unwrap();
    orchestrator.run_backfill("ws-1").await.unwrap();
    orchestrator.verify_parity("ws-1").await.unwrap();
    orchestrator.execute_cutover("ws-1").await.unwrap();
    orchestrator.rollback("ws-1").await.unwrap();

    let events = orchestrator.events("ws-1", None).await.unwrap();
    let started = events
        .iter()
        .position(|e| e.event_type == MigrationEventType::RollbackStarted)
        .expect("rollback_started logged");
    let completed = events
        .iter()
        .position(|e| e.event_type == MigrationEventType::RollbackCompleted)
        .expect("rollback_completed logged");
    assert!(started < completed);
}

#[tokio::test]
async fn midflight_rollback_keeps_dual_write_routing() {
    let (_plane, orchestrator) = seeded_orchestrator(50).await;
    let manager = orchestrator.state_manager().clone();
    orchestrator.begin_dual_write("ws-1").await.unwrap();
    manager
        .transition_to("ws-1", MigrationStatus::Backfilling)
        .await
        .unwrap();

    let result = orchestrator.rollback("ws-1").await.unwrap();

    assert!(result.success);
    let state = orchestrator.state("ws-1").await.unwrap();
    assert_eq!(state.status, MigrationStatus::RolledBack);
    // The write path was dual-writing, so it keeps doing so until an operator
    // collapses it.
    assert_eq!(state.routing_mode, RoutingMode::DualWrite);
    assert!(state.dual_write_enabled);
}

#[tokio::test]
async fn midflight_rollback_without_dual_write_collapses_to_single() {
    let (_plane, orchestrator) = seeded_orchestrator(50).await;
    let manager = orchestrator.state_manager().clone();

    // Transitioned by hand without enabling dual-write.
    manager
        .transition_to("ws-1", MigrationStatus::DualWrite)
        .await
        .unwrap();
    manager
        .transition_to("ws-1", MigrationStatus::Backfilling)
        .await
        .unwrap();
    assert!(!manager.get_state("ws-1").await.unwrap().dual_write_enabled);

    orchestrator.rollback("ws-1").await.unwrap();

    let state = orchestrator.state("ws-1").await.unwrap();
    assert_eq!(state.status, MigrationStatus::RolledBack);
    assert_eq!(state.routing_mode, RoutingMode::Single);
}

#[tokio::test]
async fn failed_migration_exits_through_rollback() {
    let (plane, orchestrator) = seeded_orchestrator(40).await;
    plane.set_failing_rows(["lead-0001".to_string()]).await;
    orchestrator.begin_dual_write("ws-1").await.unwrap();

    let report = orchestrator.run_backfill("ws-1").await.unwrap();
    assert!(!report.complete);
    assert_eq!(
        orchestrator.state("ws-1").await.unwrap().status,
        MigrationStatus::Failed
    );

    let result = orchestrator.rollback("ws-1").await.unwrap();
    assert!(result.success);
    assert_eq!(
        orchestrator.state("ws-1").await.unwrap().status,
        MigrationStatus::RolledBack
    );
}

#[tokio::test]
async fn rollback_on_idle_is_rejected() {
    let (_plane, orchestrator) = seeded_orchestrator(10).await;

    let err = orchestrator.rollback("ws-1").await.unwrap_err();
    assert!(matches!(err, MigrationError::IllegalTransition { .. }));
    assert!(err.to_string().contains("'idle'"));
}

#[tokio::test]
async fn repeated_rollback_is_an_idempotent_no_op() {
    let (_plane, orchestrator) = seeded_orchestrator(10).await;
    orchestrator.begin_dual_write("ws-1").await.unwrap();

    orchestrator.rollback("ws-1").await.unwrap();
    let events_after_first = orchestrator.events("ws-1", None).await.unwrap().len();

    let second = orchestrator.rollback("ws-1").await.unwrap();
    assert!(second.success);
    let events_after_second = orchestrator.events("ws-1", None).await.unwrap().len();
    assert_eq!(events_after_first, events_after_second);
}

#[tokio::test]
async fn rollback_for_unknown_workspace_is_not_found() {
    let orchestrator = MigrationOrchestrator::with_defaults(Arc::new(InMemoryDataPlane::new()));
    let err = orchestrator.rollback("ws-ghost").await.unwrap_err();
    assert!(matches!(err, MigrationError::NotFound(_)));
}
