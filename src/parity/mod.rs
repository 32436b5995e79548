// ============================================================================
// Parity Verifier
// ============================================================================

use crate::adapter::DataPlane;
use crate::config::ParityConfig;
use crate::core::{MigrationError, MigrationEventType, MigrationStatus, Result};
use crate::events::{MigrationEventLog, details};
use crate::state::MigrationStateManager;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of one verification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParityReport {
    pub workspace_id: String,
    pub score: u8,
    pub source_count: u64,
    pub target_count: u64,
    pub rows_compared: u64,
    pub rows_mismatched: u64,
}

/// Computes the 0-100 consistency score between source and target for a tenant.
///
/// 100 means full agreement: equal row counts and a clean content sample. The
/// score is the count ratio scaled by the matched fraction of a keyset-aligned
/// sample, computed deterministically from one read of each side, so re-running
/// over the same data can never inflate it.
pub struct ParityVerifier {
    adapter: Arc<dyn DataPlane>,
    state: Arc<MigrationStateManager>,
    events: Arc<MigrationEventLog>,
    config: ParityConfig,
}

impl ParityVerifier {
    pub fn new(
        adapter: Arc<dyn DataPlane>,
        state: Arc<MigrationStateManager>,
        events: Arc<MigrationEventLog>,
        config: ParityConfig,
    ) -> Self {
        Self {
            adapter,
            state,
            events,
            config,
        }
    }

    /// Run one verification pass and record the score on the migration record.
    pub async fn verify(&self, workspace_id: &str) -> Result<ParityReport> {
        let record = self.state.get_state(workspace_id).await?;
        if !matches!(
            record.status,
            MigrationStatus::Verifying | MigrationStatus::CutoverReady
        ) {
            return Err(MigrationError::ParityUnavailable(record.status));
        }

        let report = match self
            .compare(workspace_id, &record.source_table, &record.target_table)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                // An unreadable side is an unrecoverable verifier error.
                if record.status == MigrationStatus::Verifying {
                    self.state
                        .transition_to(workspace_id, MigrationStatus::Failed)
                        .await?;
                }
                tracing::warn!(workspace = workspace_id, error = %err, "parity verification failed");
                return Err(err);
            }
        };

        self.state.update_parity_score(workspace_id, report.score).await?;
        self.events
            .record(
                workspace_id,
                MigrationEventType::ParityVerified,
                details([
                    ("score", serde_json::json!(report.score)),
                    ("source_count", serde_json::json!(report.source_count)),
                    ("target_count", serde_json::json!(report.target_count)),
                    ("rows_mismatched", serde_json::json!(report.rows_mismatched)),
                ]),
            )
            .await?;
        tracing::info!(workspace = workspace_id, score = report.score, "parity verified");
        Ok(report)
    }

    async fn compare(
        &self,
        workspace_id: &str,
        source_table: &str,
        target_table: &str,
    ) -> Result<ParityReport> {
        let source_count = self
            .adapter
            .get_source_row_count(source_table, workspace_id)
            .await?;
        let target_count = self
            .adapter
            .get_target_row_count(target_table, workspace_id)
            .await?;

        let count_score = if source_count == 0 && target_count == 0 {
            100.0
        } else {
            let low = source_count.min(target_count) as f64;
            let high = source_count.max(target_count) as f64;
            100.0 * low / high
        };

        let sample = self
            .adapter
            .get_source_batch(source_table, workspace_id, None, self.config.sample_size)
            .await?;
        let target_sample = self
            .adapter
            .get_target_batch(target_table, workspace_id, None, self.config.sample_size)
            .await?;
        let target_by_id: HashMap<&str, &serde_json::Map<String, serde_json::Value>> =
            target_sample.iter().map(|r| (r.id.as_str(), &r.fields)).collect();

        let rows_compared = sample.len() as u64;
        let rows_mismatched = sample
            .iter()
            .filter(|row| target_by_id.get(row.id.as_str()) != Some(&&row.fields))
            .count() as u64;

        let matched_fraction = if rows_compared == 0 {
            1.0
        } else {
            (rows_compared - rows_mismatched) as f64 / rows_compared as f64
        };

        let score = (count_score * matched_fraction).floor().clamp(0.0, 100.0) as u8;

        Ok(ParityReport {
            workspace_id: workspace_id.to_string(),
            score,
            source_count,
            target_count,
            rows_compared,
            rows_mismatched,
        })
    }
}
