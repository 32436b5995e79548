pub mod error;
pub mod types;

pub use error::{MigrationError, Result};
pub use types::{
    BackfillProgress, BatchInsertOutcome, CutoverPhase, CutoverResult, CutoverStep,
    MigrationEvent, MigrationEventType, MigrationState, MigrationStatus, PreCheckResult,
    RollbackResult, RoutingMode, RowInsertError, Severity, SourceRow, StateFilter, StepStatus,
};
