/// Backfill engine tests
///
/// Covers the keyset copy loop, checkpoint/resume, partial-failure handling,
/// and source growth during the walk.
/// Run with: cargo test --test backfill_tests

use std::sync::Arc;
use tenantshift::{
    BackfillConfig, DataPlane, InMemoryDataPlane, MigrationConfig, MigrationOrchestrator,
    MigrationStatus, SourceRow,
};

const SOURCE: &str = "leads_ohio";
const TARGET: &str = "genesis.leads_p_ws1";

fn lead(n: u32) -> SourceRow {
    let mut fields = serde_json::Map::new();
    fields.insert("email".to_string(), serde_json::json!(format!("lead{}@acme.io", n)));
    fields.insert("status".to_string(), serde_json::json!("new"));
    SourceRow {
        id: format!("lead-{:04}", n),
        tenant: "ws-1".to_string(),
        fields,
    }
}

fn small_batches() -> MigrationConfig {
    MigrationConfig::new().backfill(BackfillConfig::default().batch_size(25))
}

async fn seeded(count: u32) -> (Arc<InMemoryDataPlane>, MigrationOrchestrator) {
    let plane = Arc::new(InMemoryDataPlane::new());
    plane
        .seed_source_rows(SOURCE, (1..=count).map(lead).collect())
        .await;
    let orchestrator = MigrationOrchestrator::new(plane.clone(), small_batches());
    orchestrator
        .create_migration("ws-1", SOURCE, TARGET)
        .await
        .unwrap();
    orchestrator.begin_dual_write("ws-1").await.unwrap();
    (plane, orchestrator)
}

#[tokio::test]
async fn copies_every_row_across_batches() {
    let (plane, orchestrator) = seeded(120).await;

    let report = orchestrator.run_backfill("ws-1").await.unwrap();

    assert!(report.complete);
    assert_eq!(report.rows_migrated, 120);
    assert_eq!(report.rows_total, 120);
    assert!(report.batches >= 5);
    assert_eq!(plane.get_target_row_count(TARGET, "ws-1").await.unwrap(), 120);

    // Completion hands the migration to verification.
    let state = orchestrator.state("ws-1").await.unwrap();
    assert_eq!(state.status, MigrationStatus::Verifying);
    assert_eq!(state.backfill.cursor.as_deref(), Some("lead-0120"));
}

#[tokio::test]
async fn resumes_from_persisted_checkpoint_without_duplicating() {
    let (plane, orchestrator) = seeded(120).await;
    let manager = orchestrator.state_manager().clone();

    // Simulate an interrupted run: the first 40 rows were copied and
    // checkpointed before the process died mid-backfill.
    manager
        .transition_to("ws-1", MigrationStatus::Backfilling)
        .await
        .unwrap();
    let first_forty: Vec<SourceRow> = (1..=40).map(lead).collect();
    plane.insert_target_batch(TARGET, &first_forty).await.unwrap();
    manager
        .update_backfill_progress("ws-1", 40, 120, Some("lead-0040".to_string()), None)
        .await
        .unwrap();

    let report = orchestrator.run_backfill("ws-1").await.unwrap();

    assert!(report.complete);
    assert_eq!(report.rows_migrated, 120);
    assert_eq!(plane.get_target_row_count(TARGET, "ws-1").await.unwrap(), 120);
}

#[tokio::test]
async fn backfill_cannot_rerun_once_verification_started() {
    let (plane, orchestrator) = seeded(60).await;

    orchestrator.run_backfill("ws-1").await.unwrap();
    assert_eq!(plane.get_target_row_count(TARGET, "ws-1").await.unwrap(), 60);

    let err = orchestrator.run_backfill("ws-1").await.unwrap_err();
    assert!(err.to_string().contains("'verifying'"), "{}", err);
}

#[tokio::test]
async fn poison_row_fails_the_migration_after_stalls() {
    let (plane, orchestrator) = seeded(80).await;
    plane.set_failing_rows(["lead-0050".to_string()]).await;

    let report = orchestrator.run_backfill("ws-1").await.unwrap();

    assert!(!report.complete);
    assert_eq!(report.rows_migrated, 49);
    let error = report.last_error.unwrap();
    assert!(error.contains("lead-0050"), "{}", error);

    let state = orchestrator.state("ws-1").await.unwrap();
    assert_eq!(state.status, MigrationStatus::Failed);
    assert_eq!(state.backfill.cursor.as_deref(), Some("lead-0049"));

    let events = orchestrator.events("ws-1", None).await.unwrap();
    assert!(
        events
            .iter()
            .any(|e| e.event_type == tenantshift::MigrationEventType::BackfillFailed)
    );
}

#[tokio::test]
async fn transient_row_failure_resumes_cleanly() {
    let (plane, orchestrator) = seeded(80).await;
    plane.set_failing_rows(["lead-0050".to_string()]).await;
    orchestrator.run_backfill("ws-1").await.unwrap();
    assert_eq!(
        orchestrator.state("ws-1").await.unwrap().status,
        MigrationStatus::Failed
    );

    // The operator rolls back, fixes the bad row, and starts over.
    orchestrator.rollback("ws-1").await.unwrap();
    plane.set_failing_rows(Vec::<String>::new()).await;
    orchestrator
        .create_migration("ws-1", SOURCE, TARGET)
        .await
        .unwrap();
    orchestrator.begin_dual_write("ws-1").await.unwrap();

    let report = orchestrator.run_backfill("ws-1").await.unwrap();
    assert!(report.complete);
    assert_eq!(report.rows_migrated, 80);
    assert_eq!(plane.get_target_row_count(TARGET, "ws-1").await.unwrap(), 80);
}

#[tokio::test]
async fn source_growth_ahead_of_cursor_extends_the_total() {
    let (plane, orchestrator) = seeded(50).await;
    let manager = orchestrator.state_manager().clone();

    // Checkpointed halfway, then ten more rows land with higher keys.
    manager
        .transition_to("ws-1", MigrationStatus::Backfilling)
        .await
        .unwrap();
    let first_half: Vec<SourceRow> = (1..=25).map(lead).collect();
    plane.insert_target_batch(TARGET, &first_half).await.unwrap();
    manager
        .update_backfill_progress("ws-1", 25, 50, Some("lead-0025".to_string()), None)
        .await
        .unwrap();
    for n in 51..=60 {
        plane.insert_source_row(SOURCE, lead(n)).await;
    }

    let report = orchestrator.run_backfill("ws-1").await.unwrap();

    assert!(report.complete);
    assert_eq!(report.rows_total, 60);
    assert_eq!(report.rows_migrated, 60);
}

#[tokio::test]
async fn rows_behind_the_cursor_are_reconciled() {
    let plane = Arc::new(InMemoryDataPlane::new());
    plane
        .seed_source_rows(SOURCE, (1..=30).map(lead).collect())
        .await;
    let orchestrator = MigrationOrchestrator::new(plane.clone(), small_batches());
    let manager = orchestrator.state_manager().clone();
    orchestrator
        .create_migration("ws-1", SOURCE, TARGET)
        .await
        .unwrap();
    orchestrator.begin_dual_write("ws-1").await.unwrap();
    manager
        .transition_to("ws-1", MigrationStatus::Backfilling)
        .await
        .unwrap();

    // All thirty rows already copied and checkpointed, then a row with a lower
    // key appears behind the cursor.
    let all: Vec<SourceRow> = (1..=30).map(lead).collect();
    plane.insert_target_batch(TARGET, &all).await.unwrap();
    manager
        .update_backfill_progress("ws-1", 30, 30, Some("lead-0030".to_string()), None)
        .await
        .unwrap();
    let straggler = SourceRow {
        id: "lead-0000".to_string(),
        tenant: "ws-1".to_string(),
        fields: serde_json::Map::new(),
    };
    plane.insert_source_row(SOURCE, straggler).await;

    let report = orchestrator.run_backfill("ws-1").await.unwrap();

    assert!(report.complete);
    assert_eq!(report.rows_migrated, 31);
    assert_eq!(plane.get_target_row_count(TARGET, "ws-1").await.unwrap(), 31);
}

#[tokio::test]
async fn backfill_from_wrong_phase_is_rejected() {
    let plane = Arc::new(InMemoryDataPlane::new());
    let orchestrator = MigrationOrchestrator::new(plane, small_batches());
    orchestrator
        .create_migration("ws-1", SOURCE, TARGET)
        .await
        .unwrap();

    // Still idle: dual-write has not begun, so backfilling would race the
    // write path.
    let err = orchestrator.run_backfill("ws-1").await.unwrap_err();
    assert!(err.to_string().contains("'idle'"));
}

#[tokio::test]
async fn empty_tenant_completes_immediately() {
    let plane = Arc::new(InMemoryDataPlane::new());
    let orchestrator = MigrationOrchestrator::new(plane, small_batches());
    orchestrator
        .create_migration("ws-1", SOURCE, TARGET)
        .await
        .unwrap();
    orchestrator.begin_dual_write("ws-1").await.unwrap();

    let report = orchestrator.run_backfill("ws-1").await.unwrap();
    assert!(report.complete);
    assert_eq!(report.rows_migrated, 0);
    assert_eq!(report.rows_total, 0);
    assert_eq!(
        orchestrator.state("ws-1").await.unwrap().status,
        MigrationStatus::Verifying
    );
}
