use crate::adapter::DataPlane;
use crate::core::{
    BatchInsertOutcome, MigrationError, MigrationEvent, MigrationState, Result, RowInsertError,
    SourceRow, StateFilter,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// Table rows keyed by `(tenant, id)` so keyset pagination is a range walk.
type TenantTable = BTreeMap<(String, String), SourceRow>;

/// In-memory reference data plane.
///
/// Used by the test suite and by embedders that want the orchestrator without a
/// database. Tables keep rows ordered by natural key per tenant, which gives the
/// same keyset-pagination behavior a production adapter would implement with an
/// indexed query.
#[derive(Default)]
pub struct InMemoryDataPlane {
    states: RwLock<HashMap<String, MigrationState>>,
    events: RwLock<Vec<MigrationEvent>>,
    source: RwLock<HashMap<String, TenantTable>>,
    target: RwLock<HashMap<String, TenantTable>>,
    /// Row ids that fail target upserts, for partial-failure tests.
    failing_rows: RwLock<HashSet<String>>,
}

impl InMemoryDataPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed source rows for a table.
    pub async fn seed_source_rows(&self, table: &str, rows: Vec<SourceRow>) {
        let mut source = self.source.write().await;
        let entry = source.entry(table.to_string()).or_default();
        for row in rows {
            entry.insert((row.tenant.clone(), row.id.clone()), row);
        }
    }

    /// Insert a single source row, e.g. to simulate growth during dual-write.
    pub async fn insert_source_row(&self, table: &str, row: SourceRow) {
        let mut source = self.source.write().await;
        source
            .entry(table.to_string())
            .or_default()
            .insert((row.tenant.clone(), row.id.clone()), row);
    }

    /// Drop a target row, e.g. to create a parity mismatch.
    pub async fn remove_target_row(&self, table: &str, tenant: &str, id: &str) {
        let mut target = self.target.write().await;
        if let Some(rows) = target.get_mut(table) {
            rows.remove(&(tenant.to_string(), id.to_string()));
        }
    }

    /// Overwrite one field of a target row, e.g. to create a content mismatch.
    pub async fn tamper_target_row(
        &self,
        table: &str,
        tenant: &str,
        id: &str,
        field: &str,
        value: serde_json::Value,
    ) {
        let mut target = self.target.write().await;
        if let Some(rows) = target.get_mut(table) {
            if let Some(row) = rows.get_mut(&(tenant.to_string(), id.to_string())) {
                row.fields.insert(field.to_string(), value);
            }
        }
    }

    /// Mark row ids whose target upserts fail.
    pub async fn set_failing_rows(&self, ids: impl IntoIterator<Item = String>) {
        let mut failing = self.failing_rows.write().await;
        failing.clear();
        failing.extend(ids);
    }

    fn page(table: &TenantTable, tenant: &str, after_id: Option<&str>, limit: usize) -> Vec<SourceRow> {
        table
            .iter()
            .filter(|((t, id), _)| {
                t == tenant && after_id.is_none_or(|after| id.as_str() > after)
            })
            .take(limit)
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn count(table: Option<&TenantTable>, tenant: &str) -> u64 {
        table
            .map(|rows| rows.keys().filter(|(t, _)| t == tenant).count() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DataPlane for InMemoryDataPlane {
    async fn get_migration_state(&self, workspace_id: &str) -> Result<Option<MigrationState>> {
        Ok(self.states.read().await.get(workspace_id).cloned())
    }

    async fn create_migration_state(&self, state: MigrationState) -> Result<()> {
        self.states
            .write()
            .await
            .insert(state.workspace_id.clone(), state);
        Ok(())
    }

    async fn update_migration_state(&self, state: MigrationState) -> Result<()> {
        let mut states = self.states.write().await;
        if !states.contains_key(&state.workspace_id) {
            return Err(MigrationError::NotFound(state.workspace_id));
        }
        states.insert(state.workspace_id.clone(), state);
        Ok(())
    }

    async fn delete_migration_state(&self, workspace_id: &str) -> Result<()> {
        self.states.write().await.remove(workspace_id);
        Ok(())
    }

    async fn list_migration_states(
        &self,
        filter: Option<StateFilter>,
    ) -> Result<Vec<MigrationState>> {
        let states = self.states.read().await;
        let filter = filter.unwrap_or_default();
        let mut matched: Vec<MigrationState> = states
            .values()
            .filter(|s| filter.status.is_none_or(|status| s.status == status))
            .filter(|s| !filter.active_only || s.is_active())
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.workspace_id.cmp(&b.workspace_id));
        Ok(matched)
    }

    async fn get_source_row_count(&self, table: &str, tenant: &str) -> Result<u64> {
        Ok(Self::count(self.source.read().await.get(table), tenant))
    }

    async fn get_target_row_count(&self, table: &str, tenant: &str) -> Result<u64> {
        Ok(Self::count(self.target.read().await.get(table), tenant))
    }

    async fn get_source_batch(
        &self,
        table: &str,
        tenant: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRow>> {
        let source = self.source.read().await;
        Ok(source
            .get(table)
            .map(|rows| Self::page(rows, tenant, after_id, limit))
            .unwrap_or_default())
    }

    async fn get_target_batch(
        &self,
        table: &str,
        tenant: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRow>> {
        let target = self.target.read().await;
        Ok(target
            .get(table)
            .map(|rows| Self::page(rows, tenant, after_id, limit))
            .unwrap_or_default())
    }

    async fn insert_target_batch(
        &self,
        table: &str,
        rows: &[SourceRow],
    ) -> Result<BatchInsertOutcome> {
        let failing = self.failing_rows.read().await;
        let mut target = self.target.write().await;
        let entry = target.entry(table.to_string()).or_default();

        let mut outcome = BatchInsertOutcome::default();
        for row in rows {
            if failing.contains(&row.id) {
                outcome.errors.push(RowInsertError {
                    row_id: row.id.clone(),
                    message: format!("upsert rejected for row '{}'", row.id),
                });
                continue;
            }
            entry.insert((row.tenant.clone(), row.id.clone()), row.clone());
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    async fn log_migration_event(&self, event: MigrationEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }

    async fn get_migration_events(
        &self,
        tenant: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MigrationEvent>> {
        let events = self.events.read().await;
        let matched: Vec<MigrationEvent> = events
            .iter()
            .filter(|e| e.workspace_id == tenant)
            .cloned()
            .collect();
        let limit = limit.unwrap_or(matched.len());
        Ok(matched.into_iter().take(limit).collect())
    }
}
