// ============================================================================
// Data Plane Adapter
// ============================================================================

pub mod journal;
pub mod memory;

pub use journal::{EventJournal, JournalingDataPlane, StateSnapshotFile};
pub use memory::InMemoryDataPlane;

use crate::core::{
    BatchInsertOutcome, MigrationEvent, MigrationState, Result, SourceRow, StateFilter,
};
use async_trait::async_trait;

/// The single seam between the orchestrator and the backing store.
///
/// Everything the migration core reads or writes goes through this trait: the
/// per-tenant state record, tenant row batches on both sides of the migration,
/// and the append-only audit log. Physical storage layout is the adapter's
/// concern entirely.
#[async_trait]
pub trait DataPlane: Send + Sync {
    async fn get_migration_state(&self, workspace_id: &str) -> Result<Option<MigrationState>>;

    /// Insert a fresh state record. The caller (state manager) has already
    /// enforced the at-most-one-active invariant.
    async fn create_migration_state(&self, state: MigrationState) -> Result<()>;

    /// Overwrite the record for `state.workspace_id`.
    async fn update_migration_state(&self, state: MigrationState) -> Result<()>;

    async fn delete_migration_state(&self, workspace_id: &str) -> Result<()>;

    async fn list_migration_states(&self, filter: Option<StateFilter>)
    -> Result<Vec<MigrationState>>;

    async fn get_source_row_count(&self, table: &str, tenant: &str) -> Result<u64>;

    async fn get_target_row_count(&self, table: &str, tenant: &str) -> Result<u64>;

    /// Keyset page of source rows for a tenant: rows with id strictly greater
    /// than `after_id`, ascending, at most `limit`.
    async fn get_source_batch(
        &self,
        table: &str,
        tenant: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRow>>;

    /// Keyset page of target rows, same contract as `get_source_batch`. Used by
    /// the parity verifier's content sampling.
    async fn get_target_batch(
        &self,
        table: &str,
        tenant: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRow>>;

    /// Idempotent batch upsert on the natural key. Per-row failures are
    /// reported in the outcome, never as an `Err`.
    async fn insert_target_batch(
        &self,
        table: &str,
        rows: &[SourceRow],
    ) -> Result<BatchInsertOutcome>;

    /// Append one audit event. Append order is the audit trail.
    async fn log_migration_event(&self, event: MigrationEvent) -> Result<()>;

    /// Events for a tenant in append order, oldest first, up to `limit`.
    async fn get_migration_events(
        &self,
        tenant: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MigrationEvent>>;
}
