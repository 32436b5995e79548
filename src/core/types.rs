use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Migration Status
// ============================================================================

/// Lifecycle phase of a tenant migration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Idle,
    DualWrite,
    Backfilling,
    Verifying,
    CutoverReady,
    CutoverComplete,
    Failed,
    RolledBack,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DualWrite => "dual_write",
            Self::Backfilling => "backfilling",
            Self::Verifying => "verifying",
            Self::CutoverReady => "cutover_ready",
            Self::CutoverComplete => "cutover_complete",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Terminal statuses take no further forward transitions; `CutoverComplete`
    /// remains reachable by rollback.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CutoverComplete | Self::RolledBack)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the external write path routes tenant writes.
///
/// Kept separate from `MigrationStatus` so that a rolled-back record can still
/// tell the write path whether to keep dual-writing or collapse to a single store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Single,
    DualWrite,
}

// ============================================================================
// Migration State
// ============================================================================

/// Backfill progress checkpoint persisted after every batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BackfillProgress {
    pub rows_migrated: u64,
    pub rows_total: u64,
    /// Keyset cursor: primary key of the last row copied, `None` before the first batch.
    pub cursor: Option<String>,
    pub last_error: Option<String>,
}

/// The per-tenant migration record, keyed by workspace id.
///
/// Mutated exclusively through `MigrationStateManager`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationState {
    pub workspace_id: String,
    pub source_table: String,
    pub target_table: String,
    pub status: MigrationStatus,
    pub dual_write_enabled: bool,
    pub routing_mode: RoutingMode,
    pub backfill: BackfillProgress,
    pub parity_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MigrationState {
    pub fn new(workspace_id: &str, source_table: &str, target_table: &str) -> Self {
        let now = Utc::now();
        Self {
            workspace_id: workspace_id.to_string(),
            source_table: source_table.to_string(),
            target_table: target_table.to_string(),
            status: MigrationStatus::Idle,
            dual_write_enabled: false,
            routing_mode: RoutingMode::Single,
            backfill: BackfillProgress::default(),
            parity_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn backfill_complete(&self) -> bool {
        self.backfill.rows_migrated == self.backfill.rows_total
    }
}

/// Filter for `list_migration_states`.
#[derive(Debug, Clone, Default)]
pub struct StateFilter {
    pub status: Option<MigrationStatus>,
    pub active_only: bool,
}

// ============================================================================
// Audit Events
// ============================================================================

/// Kinds of records in the append-only migration audit log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MigrationEventType {
    MigrationCreated,
    StatusChanged,
    BackfillStarted,
    BackfillCompleted,
    BackfillFailed,
    ParityVerified,
    CutoverStarted,
    CutoverCompleted,
    CutoverAborted,
    DualWriteFrozen,
    ReadPathSwapped,
    DualWriteDisabled,
    SourceArchived,
    RollbackStarted,
    RollbackCompleted,
}

impl MigrationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MigrationCreated => "migration_created",
            Self::StatusChanged => "status_changed",
            Self::BackfillStarted => "backfill_started",
            Self::BackfillCompleted => "backfill_completed",
            Self::BackfillFailed => "backfill_failed",
            Self::ParityVerified => "parity_verified",
            Self::CutoverStarted => "cutover_started",
            Self::CutoverCompleted => "cutover_completed",
            Self::CutoverAborted => "cutover_aborted",
            Self::DualWriteFrozen => "dual_write_frozen",
            Self::ReadPathSwapped => "read_path_swapped",
            Self::DualWriteDisabled => "dual_write_disabled",
            Self::SourceArchived => "source_archived",
            Self::RollbackStarted => "rollback_started",
            Self::RollbackCompleted => "rollback_completed",
        }
    }
}

impl fmt::Display for MigrationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single append-only audit record. Never mutated or deleted; the adapter
/// preserves append order, which is the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationEvent {
    pub id: Uuid,
    pub workspace_id: String,
    pub event_type: MigrationEventType,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Map<String, serde_json::Value>,
}

// ============================================================================
// Cutover
// ============================================================================

/// Severity of a pre-flight check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocker,
    Warning,
}

/// Outcome of a single pre-flight check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreCheckResult {
    pub id: String,
    pub label: String,
    pub passed: bool,
    pub severity: Severity,
    pub message: String,
}

impl PreCheckResult {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocker && !self.passed
    }
}

/// Per-step execution status inside a cutover run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Skipped,
    Failed,
}

/// One step in the cutover timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutoverStep {
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl CutoverStep {
    pub fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
        }
    }
}

/// How a cutover run ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CutoverPhase {
    Complete,
    Aborted,
}

/// Full outcome of a cutover attempt, structured for polling callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutoverResult {
    pub workspace_id: String,
    pub success: bool,
    pub phase: CutoverPhase,
    pub steps: Vec<CutoverStep>,
    pub total_duration_ms: u64,
    pub final_parity_score: Option<u8>,
    pub error: Option<String>,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackResult {
    pub success: bool,
    pub duration_ms: u64,
}

// ============================================================================
// Data Plane Rows
// ============================================================================

/// A tenant row as it crosses the data plane. `id` is the natural key and the
/// keyset cursor; `fields` carries the column payload opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRow {
    pub id: String,
    pub tenant: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// A single failed row inside a batch upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowInsertError {
    pub row_id: String,
    pub message: String,
}

/// Result of a batch upsert into the target table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BatchInsertOutcome {
    pub inserted: u64,
    pub errors: Vec<RowInsertError>,
}
