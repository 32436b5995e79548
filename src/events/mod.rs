// ============================================================================
// Migration Event Log
// ============================================================================

use crate::adapter::DataPlane;
use crate::core::{MigrationEvent, MigrationEventType, Result};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only audit sink shared by all migration components.
///
/// Stamps id and timestamp and appends through the data plane; components
/// never call `log_migration_event` directly.
pub struct MigrationEventLog {
    adapter: Arc<dyn DataPlane>,
}

impl MigrationEventLog {
    pub fn new(adapter: Arc<dyn DataPlane>) -> Self {
        Self { adapter }
    }

    /// Append one event with free-form details.
    pub async fn record(
        &self,
        workspace_id: &str,
        event_type: MigrationEventType,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let event = MigrationEvent {
            id: Uuid::new_v4(),
            workspace_id: workspace_id.to_string(),
            event_type,
            timestamp: Utc::now(),
            details,
        };
        tracing::debug!(workspace = workspace_id, event = %event_type, "migration event");
        self.adapter.log_migration_event(event).await
    }

    /// Append one event with no details.
    pub async fn record_bare(&self, workspace_id: &str, event_type: MigrationEventType) -> Result<()> {
        self.record(workspace_id, event_type, serde_json::Map::new()).await
    }

    /// Events for a workspace in append order, oldest first.
    pub async fn recent(
        &self,
        workspace_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MigrationEvent>> {
        self.adapter.get_migration_events(workspace_id, limit).await
    }
}

/// Shorthand for building a `details` map from `(key, value)` pairs.
pub fn details<const N: usize>(
    pairs: [(&str, serde_json::Value); N],
) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
