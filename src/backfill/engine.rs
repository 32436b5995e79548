use crate::adapter::DataPlane;
use crate::config::BackfillConfig;
use crate::core::{
    MigrationError, MigrationEventType, MigrationStatus, Result, SourceRow,
};
use crate::events::{MigrationEventLog, details};
use crate::state::{MigrationStateManager, TenantLockRegistry, transitions};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one backfill run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillReport {
    pub workspace_id: String,
    pub rows_migrated: u64,
    pub rows_total: u64,
    pub batches: u32,
    pub complete: bool,
    pub last_error: Option<String>,
}

/// Result of walking a key range to exhaustion.
struct WalkOutcome {
    rows_copied: u64,
    cursor: Option<String>,
    last_error: Option<String>,
    stalled: bool,
    batches: u32,
}

/// Paginated, resumable copier from the legacy source table to the partitioned
/// target table.
///
/// Pagination is keyset (cursor = last copied primary key), never offset based:
/// offsets drift under concurrent inserts and deletes on the source. Target
/// writes are idempotent upserts on the natural key, so a retried or resumed
/// batch never duplicates rows.
pub struct BackfillEngine {
    adapter: Arc<dyn DataPlane>,
    state: Arc<MigrationStateManager>,
    events: Arc<MigrationEventLog>,
    locks: Arc<TenantLockRegistry>,
    config: BackfillConfig,
}

impl BackfillEngine {
    pub fn new(
        adapter: Arc<dyn DataPlane>,
        state: Arc<MigrationStateManager>,
        events: Arc<MigrationEventLog>,
        locks: Arc<TenantLockRegistry>,
        config: BackfillConfig,
    ) -> Self {
        Self {
            adapter,
            state,
            events,
            locks,
            config,
        }
    }

    /// Copy all source rows for the workspace into the target table.
    ///
    /// Starts from `dual_write` (transitioning to `backfilling`) or resumes an
    /// interrupted `backfilling` run from its persisted cursor. Progress is
    /// checkpointed after every batch, so a process restart re-copies at most
    /// one batch, and the upsert makes even that harmless.
    pub async fn run(&self, workspace_id: &str) -> Result<BackfillReport> {
        let _guard = self.locks.acquire(workspace_id).await;

        let record = self.state.get_state(workspace_id).await?;
        let resumed = match record.status {
            MigrationStatus::DualWrite => {
                self.state
                    .transition_to(workspace_id, MigrationStatus::Backfilling)
                    .await?;
                false
            }
            MigrationStatus::Backfilling => true,
            other => {
                return Err(MigrationError::IllegalTransition {
                    workspace: workspace_id.to_string(),
                    from: other,
                    to: MigrationStatus::Backfilling,
                    allowed: transitions::allowed_as_string(other),
                });
            }
        };

        self.events
            .record(
                workspace_id,
                MigrationEventType::BackfillStarted,
                details([("resumed", serde_json::json!(resumed))]),
            )
            .await?;
        tracing::info!(workspace = workspace_id, resumed, "backfill run starting");

        let source = record.source_table.clone();
        let target = record.target_table.clone();
        let mut rows_migrated = record.backfill.rows_migrated;
        let mut cursor = record.backfill.cursor.clone();
        let mut last_error = record.backfill.last_error.clone();

        let sampled = self.adapter.get_source_row_count(&source, workspace_id).await?;
        let mut rows_total = record.backfill.rows_total.max(sampled);

        // Main copy pass with per-batch checkpointing.
        let mut batches = 0u32;
        let mut stalls = 0u32;
        loop {
            let batch = self
                .adapter
                .get_source_batch(&source, workspace_id, cursor.as_deref(), self.config.batch_size)
                .await?;

            if batch.is_empty() {
                break;
            }

            let outcome = self.adapter.insert_target_batch(&target, &batch).await?;
            let failed_ids: HashSet<&str> =
                outcome.errors.iter().map(|e| e.row_id.as_str()).collect();
            let prefix = contiguous_prefix(&batch, &failed_ids);

            if !outcome.errors.is_empty() {
                let first = &outcome.errors[0];
                last_error = Some(format!(
                    "{} row(s) failed after cursor {:?}; first: '{}': {}",
                    outcome.errors.len(),
                    cursor,
                    first.row_id,
                    first.message
                ));
            }

            if prefix == 0 {
                stalls += 1;
                self.state
                    .update_backfill_progress(
                        workspace_id,
                        rows_migrated,
                        rows_total,
                        cursor.clone(),
                        last_error.clone(),
                    )
                    .await?;
                if stalls >= self.config.max_stalled_batches {
                    return self
                        .fail(workspace_id, rows_migrated, rows_total, batches, last_error)
                        .await;
                }
                continue;
            }

            stalls = 0;
            rows_migrated += prefix as u64;
            cursor = Some(batch[prefix - 1].id.clone());
            rows_total = rows_total.max(rows_migrated);
            batches += 1;

            self.state
                .update_backfill_progress(
                    workspace_id,
                    rows_migrated,
                    rows_total,
                    cursor.clone(),
                    last_error.clone(),
                )
                .await?;
        }

        // Source exhausted: re-sample. Growth during the walk extends the total;
        // rows that appeared behind the cursor are picked up by a reconcile pass.
        let resampled = self.adapter.get_source_row_count(&source, workspace_id).await?;
        rows_total = rows_total.max(resampled);

        if rows_migrated < rows_total {
            let reconcile = self
                .reconcile(workspace_id, &source, &target)
                .await?;
            batches += reconcile.batches;
            if reconcile.stalled {
                return self
                    .fail(workspace_id, rows_migrated, rows_total, batches, reconcile.last_error)
                    .await;
            }
            if reconcile.last_error.is_some() {
                last_error = reconcile.last_error;
            }
            rows_migrated = rows_migrated.max(reconcile.rows_copied);
            if let Some(reconcile_cursor) = reconcile.cursor {
                if cursor.as_deref().is_none_or(|c| reconcile_cursor.as_str() >= c) {
                    cursor = Some(reconcile_cursor);
                }
            }
            let final_count = self.adapter.get_source_row_count(&source, workspace_id).await?;
            rows_total = rows_total.max(final_count).max(rows_migrated);
            self.state
                .update_backfill_progress(
                    workspace_id,
                    rows_migrated,
                    rows_total,
                    cursor.clone(),
                    last_error.clone(),
                )
                .await?;
        }

        let complete = rows_migrated == rows_total;
        if complete {
            self.events
                .record(
                    workspace_id,
                    MigrationEventType::BackfillCompleted,
                    details([
                        ("rows_migrated", serde_json::json!(rows_migrated)),
                        ("batches", serde_json::json!(batches)),
                    ]),
                )
                .await?;
            tracing::info!(workspace = workspace_id, rows_migrated, batches, "backfill complete");
        } else {
            // Source lost rows mid-backfill; totals never decrease, so surface
            // the shortfall and leave the record in backfilling for the operator.
            last_error = Some(format!(
                "source exhausted at {} of {} expected rows",
                rows_migrated, rows_total
            ));
            self.state
                .update_backfill_progress(
                    workspace_id,
                    rows_migrated,
                    rows_total,
                    cursor.clone(),
                    last_error.clone(),
                )
                .await?;
        }

        Ok(BackfillReport {
            workspace_id: workspace_id.to_string(),
            rows_migrated,
            rows_total,
            batches,
            complete,
            last_error,
        })
    }

    /// One bounded catch-up pass from the current cursor, used by the cutover's
    /// delta-sync step. The caller already holds the tenant lock; acquiring it
    /// here again would deadlock.
    pub async fn sync_delta(&self, workspace_id: &str) -> Result<u64> {
        let record = self.state.get_state(workspace_id).await?;
        let source = record.source_table.clone();
        let target = record.target_table.clone();

        let walk = self
            .walk(workspace_id, &source, &target, record.backfill.cursor.clone())
            .await?;
        if walk.stalled {
            return Err(MigrationError::Adapter(format!(
                "delta sync stalled: {}",
                walk.last_error.unwrap_or_else(|| "repeated upsert failures".to_string())
            )));
        }

        if walk.rows_copied > 0 {
            let rows_migrated = record.backfill.rows_migrated + walk.rows_copied;
            let rows_total = record.backfill.rows_total.max(rows_migrated);
            self.state
                .update_backfill_progress(
                    workspace_id,
                    rows_migrated,
                    rows_total,
                    walk.cursor.or(record.backfill.cursor),
                    walk.last_error,
                )
                .await?;
        }
        tracing::debug!(workspace = workspace_id, rows = walk.rows_copied, "delta sync");
        Ok(walk.rows_copied)
    }

    /// Full re-walk from the start of the key range. Upserts are idempotent, so
    /// this only fills gaps (rows that appeared behind the cursor during the
    /// main pass) and recounts what is actually present.
    async fn reconcile(&self, workspace_id: &str, source: &str, target: &str) -> Result<WalkOutcome> {
        tracing::info!(workspace = workspace_id, "reconcile pass for rows behind cursor");
        self.walk(workspace_id, source, target, None).await
    }

    /// Walk from `cursor` to exhaustion, upserting every batch. No progress is
    /// persisted here; callers decide how the counts fold into the record.
    async fn walk(
        &self,
        workspace_id: &str,
        source: &str,
        target: &str,
        mut cursor: Option<String>,
    ) -> Result<WalkOutcome> {
        let mut rows_copied = 0u64;
        let mut last_error = None;
        let mut stalls = 0u32;
        let mut batches = 0u32;

        loop {
            let batch = self
                .adapter
                .get_source_batch(source, workspace_id, cursor.as_deref(), self.config.batch_size)
                .await?;
            if batch.is_empty() {
                return Ok(WalkOutcome {
                    rows_copied,
                    cursor,
                    last_error,
                    stalled: false,
                    batches,
                });
            }

            let outcome = self.adapter.insert_target_batch(target, &batch).await?;
            let failed_ids: HashSet<&str> =
                outcome.errors.iter().map(|e| e.row_id.as_str()).collect();
            let prefix = contiguous_prefix(&batch, &failed_ids);

            if !outcome.errors.is_empty() {
                let first = &outcome.errors[0];
                last_error = Some(format!(
                    "{} row(s) failed after cursor {:?}; first: '{}': {}",
                    outcome.errors.len(),
                    cursor,
                    first.row_id,
                    first.message
                ));
            }

            if prefix == 0 {
                stalls += 1;
                if stalls >= self.config.max_stalled_batches {
                    return Ok(WalkOutcome {
                        rows_copied,
                        cursor,
                        last_error,
                        stalled: true,
                        batches,
                    });
                }
                continue;
            }

            stalls = 0;
            rows_copied += prefix as u64;
            cursor = Some(batch[prefix - 1].id.clone());
            batches += 1;
        }
    }

    async fn fail(
        &self,
        workspace_id: &str,
        rows_migrated: u64,
        rows_total: u64,
        batches: u32,
        last_error: Option<String>,
    ) -> Result<BackfillReport> {
        let message = last_error
            .clone()
            .unwrap_or_else(|| "backfill made no progress".to_string());
        self.state
            .transition_to(workspace_id, MigrationStatus::Failed)
            .await?;
        self.events
            .record(
                workspace_id,
                MigrationEventType::BackfillFailed,
                details([("error", serde_json::json!(message))]),
            )
            .await?;
        tracing::warn!(workspace = workspace_id, error = %message, "backfill failed");
        Ok(BackfillReport {
            workspace_id: workspace_id.to_string(),
            rows_migrated,
            rows_total,
            batches,
            complete: false,
            last_error: Some(message),
        })
    }
}

/// Length of the batch prefix that inserted without error. The cursor advances
/// past these rows only, so a failed row is re-fetched on the next pass rather
/// than silently skipped.
fn contiguous_prefix(batch: &[SourceRow], failed_ids: &HashSet<&str>) -> usize {
    batch
        .iter()
        .take_while(|row| !failed_ids.contains(row.id.as_str()))
        .count()
}
