// ============================================================================
// Migration Orchestrator Facade
// ============================================================================

use crate::adapter::DataPlane;
use crate::backfill::{BackfillEngine, BackfillReport};
use crate::config::MigrationConfig;
use crate::core::{
    CutoverResult, MigrationEvent, MigrationState, MigrationStatus, PreCheckResult, Result,
    RollbackResult, RoutingMode, StateFilter,
};
use crate::cutover::{CutoverManager, Readiness};
use crate::events::MigrationEventLog;
use crate::parity::{ParityReport, ParityVerifier};
use crate::state::{MigrationStateManager, TenantLockRegistry, TransitionExtras};
use std::sync::Arc;

/// Composition root for the migration core.
///
/// Wires the state manager, backfill engine, parity verifier and cutover
/// manager over one shared data plane, and owns the phase handoffs between
/// them: backfill completion advances to verification, a passing verification
/// advances to cutover readiness.
pub struct MigrationOrchestrator {
    state: Arc<MigrationStateManager>,
    events: Arc<MigrationEventLog>,
    backfill: Arc<BackfillEngine>,
    parity: Arc<ParityVerifier>,
    cutover: Arc<CutoverManager>,
    parity_threshold: u8,
}

impl MigrationOrchestrator {
    pub fn new(adapter: Arc<dyn DataPlane>, config: MigrationConfig) -> Self {
        let events = Arc::new(MigrationEventLog::new(adapter.clone()));
        let state = Arc::new(MigrationStateManager::new(adapter.clone(), events.clone()));
        let locks = Arc::new(TenantLockRegistry::new());
        let backfill = Arc::new(BackfillEngine::new(
            adapter.clone(),
            state.clone(),
            events.clone(),
            locks.clone(),
            config.backfill.clone(),
        ));
        let parity = Arc::new(ParityVerifier::new(
            adapter.clone(),
            state.clone(),
            events.clone(),
            config.parity.clone(),
        ));
        let cutover = Arc::new(CutoverManager::new(
            adapter,
            state.clone(),
            events.clone(),
            locks,
            backfill.clone(),
            parity.clone(),
            config.cutover.clone(),
        ));
        Self {
            state,
            events,
            backfill,
            parity,
            cutover,
            parity_threshold: config.cutover.parity_threshold,
        }
    }

    /// Construct with default configuration.
    pub fn with_defaults(adapter: Arc<dyn DataPlane>) -> Self {
        Self::new(adapter, MigrationConfig::default())
    }

    /// Create the migration record for a workspace.
    pub async fn create_migration(
        &self,
        workspace_id: &str,
        source_table: &str,
        target_table: &str,
    ) -> Result<MigrationState> {
        self.state
            .create_migration(workspace_id, source_table, target_table)
            .await
    }

    /// Begin the dual-write window: the external write path starts writing
    /// every mutation to both stores.
    pub async fn begin_dual_write(&self, workspace_id: &str) -> Result<MigrationState> {
        self.state
            .transition_with(
                workspace_id,
                MigrationStatus::DualWrite,
                TransitionExtras {
                    dual_write_enabled: Some(true),
                    routing_mode: Some(RoutingMode::DualWrite),
                },
            )
            .await
    }

    /// Run the backfill to completion (or failure). A complete backfill
    /// advances the migration to `verifying`.
    pub async fn run_backfill(&self, workspace_id: &str) -> Result<BackfillReport> {
        let report = self.backfill.run(workspace_id).await?;
        if report.complete {
            self.state
                .transition_to(workspace_id, MigrationStatus::Verifying)
                .await?;
        }
        Ok(report)
    }

    /// Run one parity verification pass. A score at or above the configured
    /// threshold advances `verifying` to `cutover_ready`.
    pub async fn verify_parity(&self, workspace_id: &str) -> Result<ParityReport> {
        let report = self.parity.verify(workspace_id).await?;
        if report.score >= self.parity_threshold {
            let record = self.state.get_state(workspace_id).await?;
            if record.status == MigrationStatus::Verifying {
                self.state
                    .transition_to(workspace_id, MigrationStatus::CutoverReady)
                    .await?;
            }
        }
        Ok(report)
    }

    /// Full pre-check list.
    pub async fn run_prechecks(&self, workspace_id: &str) -> Vec<PreCheckResult> {
        self.cutover.run_prechecks(workspace_id).await
    }

    /// Readiness signal for polling callers.
    pub async fn readiness(&self, workspace_id: &str) -> Readiness {
        self.cutover.get_readiness(workspace_id).await
    }

    /// Execute the 8-step cutover.
    pub async fn execute_cutover(&self, workspace_id: &str) -> Result<CutoverResult> {
        self.cutover.execute(workspace_id).await
    }

    /// Roll the migration back.
    pub async fn rollback(&self, workspace_id: &str) -> Result<RollbackResult> {
        self.cutover.rollback(workspace_id).await
    }

    /// Current migration record.
    pub async fn state(&self, workspace_id: &str) -> Result<MigrationState> {
        self.state.get_state(workspace_id).await
    }

    /// All migration records matching a filter.
    pub async fn list(&self, filter: Option<StateFilter>) -> Result<Vec<MigrationState>> {
        self.state.list(filter).await
    }

    /// Audit events for a workspace, oldest first.
    pub async fn events(
        &self,
        workspace_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MigrationEvent>> {
        self.events.recent(workspace_id, limit).await
    }

    /// Direct access to the state manager, for embedders that drive
    /// transitions themselves.
    pub fn state_manager(&self) -> &Arc<MigrationStateManager> {
        &self.state
    }
}
