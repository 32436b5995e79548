use crate::adapter::DataPlane;
use crate::backfill::BackfillEngine;
use crate::config::CutoverConfig;
use crate::core::{
    CutoverPhase, CutoverResult, CutoverStep, MigrationError, MigrationEventType, MigrationStatus,
    PreCheckResult, Result, RollbackResult, RoutingMode, StepStatus,
};
use crate::cutover::prechecks::{self, Readiness};
use crate::cutover::steps::CutoverStepKind;
use crate::events::{MigrationEventLog, details};
use crate::parity::ParityVerifier;
use crate::state::{MigrationStateManager, TenantLockRegistry, TransitionExtras, transitions};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Runs the pre-checked, ordered, abortable cutover sequence and its
/// compensating rollback.
///
/// `execute` is the only call here that errors on misuse (wrong phase); every
/// operational outcome, including a fully blocked cutover, comes back as a
/// structured `CutoverResult`.
pub struct CutoverManager {
    adapter: Arc<dyn DataPlane>,
    state: Arc<MigrationStateManager>,
    events: Arc<MigrationEventLog>,
    locks: Arc<TenantLockRegistry>,
    backfill: Arc<BackfillEngine>,
    parity: Arc<ParityVerifier>,
    config: CutoverConfig,
}

impl CutoverManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn DataPlane>,
        state: Arc<MigrationStateManager>,
        events: Arc<MigrationEventLog>,
        locks: Arc<TenantLockRegistry>,
        backfill: Arc<BackfillEngine>,
        parity: Arc<ParityVerifier>,
        config: CutoverConfig,
    ) -> Self {
        Self {
            adapter,
            state,
            events,
            locks,
            backfill,
            parity,
            config,
        }
    }

    /// Run every pre-flight check. Never errors; adapter failures surface as
    /// failed checks.
    pub async fn run_prechecks(&self, workspace_id: &str) -> Vec<PreCheckResult> {
        let record = match self.adapter.get_migration_state(workspace_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return prechecks::missing_record(workspace_id),
            Err(err) => {
                return vec![prechecks::check(
                    "migration_exists",
                    "Migration record exists",
                    crate::core::Severity::Blocker,
                    false,
                    format!("State lookup failed: {}", err),
                )];
            }
        };

        let counts = self.row_counts(&record).await;
        prechecks::evaluate(&record, counts, &self.config)
    }

    /// Readiness signal for polling callers. Read-only and idempotent: two
    /// calls without an intervening mutation return identical results.
    pub async fn get_readiness(&self, workspace_id: &str) -> Readiness {
        let checks = self.run_prechecks(workspace_id).await;
        prechecks::readiness_from(&checks)
    }

    /// Execute the 8-step cutover sequence.
    ///
    /// Errors only when invoked on a migration outside `verifying` /
    /// `cutover_ready` (orchestration bug). A blocked or failed run returns a
    /// structured aborted result with the remaining steps skipped.
    pub async fn execute(&self, workspace_id: &str) -> Result<CutoverResult> {
        let _guard = self.locks.acquire(workspace_id).await;

        let record = self.state.get_state(workspace_id).await?;
        if !matches!(
            record.status,
            MigrationStatus::Verifying | MigrationStatus::CutoverReady
        ) {
            return Err(MigrationError::CutoverNotAllowed(record.status));
        }

        self.events
            .record_bare(workspace_id, MigrationEventType::CutoverStarted)
            .await?;
        tracing::info!(workspace = workspace_id, from = %record.status, "cutover starting");

        let started = Instant::now();
        let mut steps: Vec<CutoverStep> = CutoverStepKind::SEQUENCE
            .iter()
            .map(|kind| CutoverStep::pending(kind.as_str()))
            .collect();
        let mut failure: Option<String> = None;

        for (index, kind) in CutoverStepKind::SEQUENCE.iter().enumerate() {
            steps[index].status = StepStatus::Running;
            steps[index].started_at = Some(Utc::now());

            let outcome =
                match tokio::time::timeout(self.config.step_timeout, self.run_step(*kind, workspace_id))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(format!(
                        "step '{}' timed out after {:?}",
                        kind, self.config.step_timeout
                    )),
                };

            steps[index].ended_at = Some(Utc::now());
            match outcome {
                Ok(()) => {
                    steps[index].status = StepStatus::Completed;
                    tracing::debug!(workspace = workspace_id, step = %kind, "cutover step completed");
                }
                Err(message) => {
                    steps[index].status = StepStatus::Failed;
                    steps[index].error = Some(message.clone());
                    for remaining in steps.iter_mut().skip(index + 1) {
                        remaining.status = StepStatus::Skipped;
                    }
                    failure = Some(message);
                    break;
                }
            }
        }

        // Sub-millisecond runs still report a positive duration.
        let total_duration_ms = (started.elapsed().as_millis() as u64).max(1);

        if let Some(error) = failure {
            self.events
                .record(
                    workspace_id,
                    MigrationEventType::CutoverAborted,
                    details([("error", serde_json::json!(error))]),
                )
                .await?;
            tracing::warn!(workspace = workspace_id, %error, "cutover aborted");
            return Ok(CutoverResult {
                workspace_id: workspace_id.to_string(),
                success: false,
                phase: CutoverPhase::Aborted,
                steps,
                total_duration_ms,
                final_parity_score: None,
                error: Some(error),
            });
        }

        let finalized = self.state.get_state(workspace_id).await?;
        self.events
            .record(
                workspace_id,
                MigrationEventType::CutoverCompleted,
                details([("duration_ms", serde_json::json!(total_duration_ms))]),
            )
            .await?;
        tracing::info!(workspace = workspace_id, total_duration_ms, "cutover complete");

        Ok(CutoverResult {
            workspace_id: workspace_id.to_string(),
            success: true,
            phase: CutoverPhase::Complete,
            steps,
            total_duration_ms,
            final_parity_score: finalized.parity_score,
            error: None,
        })
    }

    /// Revert the migration. Callable from any non-idle status, including after
    /// a completed cutover or a failed migration; calling it on an already
    /// rolled-back record is a no-op success.
    pub async fn rollback(&self, workspace_id: &str) -> Result<RollbackResult> {
        let started = Instant::now();
        let _guard = self.locks.acquire(workspace_id).await;

        let record = self.state.get_state(workspace_id).await?;
        if record.status == MigrationStatus::RolledBack {
            return Ok(RollbackResult {
                success: true,
                duration_ms: (started.elapsed().as_millis() as u64).max(1),
            });
        }
        if record.status == MigrationStatus::Idle {
            return Err(MigrationError::IllegalTransition {
                workspace: workspace_id.to_string(),
                from: record.status,
                to: MigrationStatus::RolledBack,
                allowed: transitions::allowed_as_string(record.status),
            });
        }

        self.events
            .record(
                workspace_id,
                MigrationEventType::RollbackStarted,
                details([("from", serde_json::json!(record.status.as_str()))]),
            )
            .await?;
        tracing::info!(workspace = workspace_id, from = %record.status, "rollback starting");

        // Rolling back a completed cutover hands the legacy store back as the
        // single authority; a mid-flight rollback keeps dual-writing when the
        // write path was already doing so.
        let routing = if record.status == MigrationStatus::CutoverComplete {
            RoutingMode::Single
        } else if record.dual_write_enabled {
            RoutingMode::DualWrite
        } else {
            RoutingMode::Single
        };

        self.state
            .transition_with(
                workspace_id,
                MigrationStatus::RolledBack,
                TransitionExtras {
                    dual_write_enabled: Some(routing == RoutingMode::DualWrite),
                    routing_mode: Some(routing),
                },
            )
            .await?;

        let routing_label = match routing {
            RoutingMode::Single => "single",
            RoutingMode::DualWrite => "dual_write",
        };
        self.events
            .record(
                workspace_id,
                MigrationEventType::RollbackCompleted,
                details([("routing_mode", serde_json::json!(routing_label))]),
            )
            .await?;

        Ok(RollbackResult {
            success: true,
            duration_ms: (started.elapsed().as_millis() as u64).max(1),
        })
    }

    async fn run_step(&self, kind: CutoverStepKind, workspace_id: &str) -> std::result::Result<(), String> {
        match kind {
            CutoverStepKind::RunPrechecks => {
                let checks = self.run_prechecks(workspace_id).await;
                let blockers: Vec<&PreCheckResult> =
                    checks.iter().filter(|c| c.is_blocking()).collect();
                if blockers.is_empty() {
                    return Ok(());
                }
                let summary = blockers
                    .iter()
                    .map(|c| format!("{}: {}", c.id, c.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(format!("{} blocking pre-check(s): {}", blockers.len(), summary))
            }
            CutoverStepKind::FreezeDualWrite => {
                // Signal for the external write path; writes quiesce while the
                // remaining steps run.
                self.events
                    .record_bare(workspace_id, MigrationEventType::DualWriteFrozen)
                    .await
                    .map_err(|e| e.to_string())
            }
            CutoverStepKind::FinalDeltaSync => {
                self.backfill
                    .sync_delta(workspace_id)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
            CutoverStepKind::FinalParityCheck => {
                let report = self
                    .parity
                    .verify(workspace_id)
                    .await
                    .map_err(|e| e.to_string())?;
                if report.score < self.config.parity_threshold {
                    return Err(format!(
                        "final parity {} below threshold {}",
                        report.score, self.config.parity_threshold
                    ));
                }
                let record = self.state.get_state(workspace_id).await.map_err(|e| e.to_string())?;
                if record.status == MigrationStatus::Verifying {
                    self.state
                        .transition_to(workspace_id, MigrationStatus::CutoverReady)
                        .await
                        .map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            CutoverStepKind::SwapReadPath => {
                let record = self.state.get_state(workspace_id).await.map_err(|e| e.to_string())?;
                self.events
                    .record(
                        workspace_id,
                        MigrationEventType::ReadPathSwapped,
                        details([
                            ("from", serde_json::json!(record.source_table)),
                            ("to", serde_json::json!(record.target_table)),
                        ]),
                    )
                    .await
                    .map_err(|e| e.to_string())
            }
            CutoverStepKind::DisableDualWrite => {
                self.state
                    .set_dual_write(workspace_id, false)
                    .await
                    .map_err(|e| e.to_string())?;
                self.events
                    .record_bare(workspace_id, MigrationEventType::DualWriteDisabled)
                    .await
                    .map_err(|e| e.to_string())
            }
            CutoverStepKind::ArchiveSource => {
                // Physical archival belongs to the retention process; the event
                // marks the source as no longer authoritative.
                let record = self.state.get_state(workspace_id).await.map_err(|e| e.to_string())?;
                self.events
                    .record(
                        workspace_id,
                        MigrationEventType::SourceArchived,
                        details([("table", serde_json::json!(record.source_table))]),
                    )
                    .await
                    .map_err(|e| e.to_string())
            }
            CutoverStepKind::FinalizeState => {
                self.state
                    .transition_with(
                        workspace_id,
                        MigrationStatus::CutoverComplete,
                        TransitionExtras {
                            dual_write_enabled: None,
                            routing_mode: Some(RoutingMode::Single),
                        },
                    )
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }
        }
    }

    async fn row_counts(&self, record: &crate::core::MigrationState) -> std::result::Result<(u64, u64), String> {
        let source = self
            .adapter
            .get_source_row_count(&record.source_table, &record.workspace_id)
            .await
            .map_err(|e| e.to_string())?;
        let target = self
            .adapter
            .get_target_row_count(&record.target_table, &record.workspace_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok((source, target))
    }
}
