use crate::adapter::DataPlane;
use crate::core::{
    MigrationError, MigrationEventType, MigrationState, MigrationStatus, Result, RoutingMode,
    StateFilter,
};
use crate::events::{MigrationEventLog, details};
use crate::state::transitions;
use chrono::Utc;
use std::sync::Arc;

/// Field updates applied atomically with a status transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionExtras {
    pub dual_write_enabled: Option<bool>,
    pub routing_mode: Option<RoutingMode>,
}

/// Owner of the per-tenant migration record.
///
/// The single mutation gateway: every component reads and writes migration
/// state through these methods, which enforce the legal-transition table and
/// the record invariants.
pub struct MigrationStateManager {
    adapter: Arc<dyn DataPlane>,
    events: Arc<MigrationEventLog>,
}

impl MigrationStateManager {
    pub fn new(adapter: Arc<dyn DataPlane>, events: Arc<MigrationEventLog>) -> Self {
        Self { adapter, events }
    }

    /// Create the migration record for a workspace with `status = idle`.
    ///
    /// At most one active migration may exist per workspace; a terminal
    /// predecessor record is replaced.
    pub async fn create_migration(
        &self,
        workspace_id: &str,
        source_table: &str,
        target_table: &str,
    ) -> Result<MigrationState> {
        if let Some(existing) = self.adapter.get_migration_state(workspace_id).await? {
            if existing.is_active() {
                return Err(MigrationError::AlreadyExists(workspace_id.to_string()));
            }
            self.adapter.delete_migration_state(workspace_id).await?;
        }

        let state = MigrationState::new(workspace_id, source_table, target_table);
        self.adapter.create_migration_state(state.clone()).await?;
        self.events
            .record(
                workspace_id,
                MigrationEventType::MigrationCreated,
                details([
                    ("source_table", serde_json::json!(source_table)),
                    ("target_table", serde_json::json!(target_table)),
                ]),
            )
            .await?;
        tracing::info!(workspace = workspace_id, source_table, target_table, "migration created");
        Ok(state)
    }

    /// Move the record to `new_status`, validating against the legal edge set.
    pub async fn transition_to(
        &self,
        workspace_id: &str,
        new_status: MigrationStatus,
    ) -> Result<MigrationState> {
        self.transition_with(workspace_id, new_status, TransitionExtras::default())
            .await
    }

    /// Transition with field updates applied atomically with the status change.
    pub async fn transition_with(
        &self,
        workspace_id: &str,
        new_status: MigrationStatus,
        extras: TransitionExtras,
    ) -> Result<MigrationState> {
        let mut state = self.load(workspace_id).await?;
        let from = state.status;

        if !transitions::is_legal(from, new_status) {
            return Err(MigrationError::IllegalTransition {
                workspace: workspace_id.to_string(),
                from,
                to: new_status,
                allowed: transitions::allowed_as_string(from),
            });
        }

        state.status = new_status;
        if let Some(enabled) = extras.dual_write_enabled {
            state.dual_write_enabled = enabled;
        }
        if let Some(mode) = extras.routing_mode {
            state.routing_mode = mode;
        }
        state.updated_at = Utc::now();
        self.adapter.update_migration_state(state.clone()).await?;

        self.events
            .record(
                workspace_id,
                MigrationEventType::StatusChanged,
                details([
                    ("from", serde_json::json!(from.as_str())),
                    ("to", serde_json::json!(new_status.as_str())),
                ]),
            )
            .await?;
        tracing::debug!(workspace = workspace_id, %from, to = %new_status, "status transition");
        Ok(state)
    }

    /// Persist a backfill checkpoint. Counters are monotonic and the cursor
    /// only advances; the status is never changed here.
    pub async fn update_backfill_progress(
        &self,
        workspace_id: &str,
        rows_migrated: u64,
        rows_total: u64,
        cursor: Option<String>,
        last_error: Option<String>,
    ) -> Result<MigrationState> {
        let mut state = self.load(workspace_id).await?;

        if !state.is_active() {
            return Err(MigrationError::InvalidProgress {
                workspace: workspace_id.to_string(),
                reason: format!("record is terminal ('{}')", state.status),
            });
        }
        if rows_migrated < state.backfill.rows_migrated {
            return Err(MigrationError::InvalidProgress {
                workspace: workspace_id.to_string(),
                reason: format!(
                    "rows_migrated regressed: {} -> {}",
                    state.backfill.rows_migrated, rows_migrated
                ),
            });
        }
        if rows_total < state.backfill.rows_total {
            return Err(MigrationError::InvalidProgress {
                workspace: workspace_id.to_string(),
                reason: format!(
                    "rows_total regressed: {} -> {}",
                    state.backfill.rows_total, rows_total
                ),
            });
        }
        if rows_migrated > rows_total {
            return Err(MigrationError::InvalidProgress {
                workspace: workspace_id.to_string(),
                reason: format!("rows_migrated {} exceeds rows_total {}", rows_migrated, rows_total),
            });
        }
        if let (Some(new), Some(old)) = (cursor.as_deref(), state.backfill.cursor.as_deref()) {
            if new < old {
                return Err(MigrationError::InvalidProgress {
                    workspace: workspace_id.to_string(),
                    reason: format!("cursor regressed: '{}' -> '{}'", old, new),
                });
            }
        }

        state.backfill.rows_migrated = rows_migrated;
        state.backfill.rows_total = rows_total;
        if cursor.is_some() {
            state.backfill.cursor = cursor;
        }
        state.backfill.last_error = last_error;
        state.updated_at = Utc::now();
        self.adapter.update_migration_state(state.clone()).await?;
        Ok(state)
    }

    /// Record a parity score, clamped to [0, 100]. Only legal once the
    /// migration has reached verification.
    pub async fn update_parity_score(&self, workspace_id: &str, score: u8) -> Result<u8> {
        let mut state = self.load(workspace_id).await?;

        if !matches!(
            state.status,
            MigrationStatus::Verifying | MigrationStatus::CutoverReady
        ) {
            return Err(MigrationError::ParityUnavailable(state.status));
        }

        let score = score.min(100);
        state.parity_score = Some(score);
        state.updated_at = Utc::now();
        self.adapter.update_migration_state(state).await?;
        Ok(score)
    }

    /// Flip the dual-write flag without a status change.
    pub async fn set_dual_write(&self, workspace_id: &str, enabled: bool) -> Result<MigrationState> {
        let mut state = self.load_active(workspace_id).await?;
        state.dual_write_enabled = enabled;
        state.updated_at = Utc::now();
        self.adapter.update_migration_state(state.clone()).await?;
        Ok(state)
    }

    /// Point the external write path without a status change.
    pub async fn set_routing_mode(
        &self,
        workspace_id: &str,
        mode: RoutingMode,
    ) -> Result<MigrationState> {
        let mut state = self.load_active(workspace_id).await?;
        state.routing_mode = mode;
        state.updated_at = Utc::now();
        self.adapter.update_migration_state(state.clone()).await?;
        Ok(state)
    }

    /// Current record for a workspace.
    pub async fn get_state(&self, workspace_id: &str) -> Result<MigrationState> {
        self.load(workspace_id).await
    }

    /// All records matching a filter.
    pub async fn list(&self, filter: Option<StateFilter>) -> Result<Vec<MigrationState>> {
        self.adapter.list_migration_states(filter).await
    }

    async fn load(&self, workspace_id: &str) -> Result<MigrationState> {
        self.adapter
            .get_migration_state(workspace_id)
            .await?
            .ok_or_else(|| MigrationError::NotFound(workspace_id.to_string()))
    }

    async fn load_active(&self, workspace_id: &str) -> Result<MigrationState> {
        let state = self.load(workspace_id).await?;
        if !state.is_active() {
            return Err(MigrationError::InvalidProgress {
                workspace: workspace_id.to_string(),
                reason: format!("record is terminal ('{}')", state.status),
            });
        }
        Ok(state)
    }
}
