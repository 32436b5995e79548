// ============================================================================
// tenantshift Library
// ============================================================================

//! Zero-downtime tenant data migration orchestrator.
//!
//! Moves a tenant's records from a legacy single table to a new partitioned
//! store without dropping writes or serving inconsistent reads: a strict
//! per-tenant state machine, a resumable keyset backfill, a parity gate, and
//! an atomic 8-step cutover with rollback, all over one injected data plane.
//!
//! The recommended entry point is [`MigrationOrchestrator`], which wires every
//! component over one adapter.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tenantshift::{InMemoryDataPlane, MigrationOrchestrator, MigrationStatus};
//!
//! tokio_test::block_on(async {
//!     let adapter = Arc::new(InMemoryDataPlane::new());
//!     let orchestrator = MigrationOrchestrator::with_defaults(adapter);
//!
//!     orchestrator
//!         .create_migration("ws-1", "leads_ohio", "genesis.leads_p_ws1")
//!         .await
//!         .unwrap();
//!
//!     let state = orchestrator.state("ws-1").await.unwrap();
//!     assert_eq!(state.status, MigrationStatus::Idle);
//!     assert_eq!(state.source_table, "leads_ohio");
//! });
//! ```
//!
//! Driving a migration end to end:
//!
//! ```
//! use std::sync::Arc;
//! use tenantshift::{InMemoryDataPlane, MigrationOrchestrator};
//!
//! tokio_test::block_on(async {
//!     let adapter = Arc::new(InMemoryDataPlane::new());
//!     let orchestrator = MigrationOrchestrator::with_defaults(adapter.clone());
//!
//!     orchestrator
//!         .create_migration("ws-1", "leads_ohio", "genesis.leads_p_ws1")
//!         .await
//!         .unwrap();
//!     orchestrator.begin_dual_write("ws-1").await.unwrap();
//!
//!     let report = orchestrator.run_backfill("ws-1").await.unwrap();
//!     assert!(report.complete);
//!
//!     let parity = orchestrator.verify_parity("ws-1").await.unwrap();
//!     assert_eq!(parity.score, 100);
//!
//!     let result = orchestrator.execute_cutover("ws-1").await.unwrap();
//!     assert!(result.success);
//!     assert_eq!(result.steps.len(), 8);
//! });
//! ```

pub mod adapter;
pub mod backfill;
pub mod config;
pub mod core;
pub mod cutover;
pub mod events;
pub mod facade;
pub mod parity;
pub mod state;

// Re-export main types for convenience
pub use adapter::{DataPlane, EventJournal, InMemoryDataPlane, JournalingDataPlane};
pub use backfill::{BackfillEngine, BackfillReport};
pub use config::{BackfillConfig, CutoverConfig, MigrationConfig, ParityConfig};
pub use crate::core::{
    BackfillProgress, BatchInsertOutcome, CutoverPhase, CutoverResult, CutoverStep,
    MigrationError, MigrationEvent, MigrationEventType, MigrationState, MigrationStatus,
    PreCheckResult, Result, RollbackResult, RoutingMode, Severity, SourceRow, StateFilter,
    StepStatus,
};
pub use cutover::{CutoverManager, CutoverStepKind, Readiness};
pub use events::MigrationEventLog;
pub use facade::MigrationOrchestrator;
pub use parity::{ParityReport, ParityVerifier};
pub use state::{MigrationStateManager, TenantLockRegistry, TransitionExtras};
