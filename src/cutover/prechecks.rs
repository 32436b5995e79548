//! Pre-flight checks gating the cutover.
//!
//! Checks are structured results, never errors: a polling caller renders them
//! as a checklist and retries once blockers clear.

use crate::config::CutoverConfig;
use crate::core::{MigrationState, MigrationStatus, PreCheckResult, Severity};

/// Cutover readiness derived from the pre-checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    pub ready: bool,
    pub blockers: Vec<PreCheckResult>,
}

pub(crate) fn check(
    id: &str,
    label: &str,
    severity: Severity,
    passed: bool,
    message: String,
) -> PreCheckResult {
    PreCheckResult {
        id: id.to_string(),
        label: label.to_string(),
        passed,
        severity,
        message,
    }
}

/// The one check emitted when the migration record is missing entirely.
pub(crate) fn missing_record(workspace_id: &str) -> Vec<PreCheckResult> {
    vec![check(
        "migration_exists",
        "Migration record exists",
        Severity::Blocker,
        false,
        format!("No migration found for workspace '{}'", workspace_id),
    )]
}

/// Evaluate the full check list for a loaded record.
///
/// `counts` is the (source, target) row count pair, or the error message from
/// fetching it; count problems stay advisory so a flaky count query cannot
/// block an otherwise ready cutover.
pub(crate) fn evaluate(
    state: &MigrationState,
    counts: Result<(u64, u64), String>,
    config: &CutoverConfig,
) -> Vec<PreCheckResult> {
    let mut checks = Vec::with_capacity(7);

    checks.push(check(
        "migration_exists",
        "Migration record exists",
        Severity::Blocker,
        true,
        format!("Migration record found for '{}'", state.workspace_id),
    ));

    let phase_ok = matches!(
        state.status,
        MigrationStatus::Verifying | MigrationStatus::CutoverReady
    );
    checks.push(check(
        "current_phase",
        "Migration phase allows cutover",
        Severity::Blocker,
        phase_ok,
        if phase_ok {
            format!("Status '{}' allows cutover", state.status)
        } else {
            format!("Cannot start cutover in '{}' state", state.status)
        },
    ));

    let parity_ok = state
        .parity_score
        .is_some_and(|score| score >= config.parity_threshold);
    checks.push(check(
        "parity_score",
        "Parity score meets threshold",
        Severity::Blocker,
        parity_ok,
        match state.parity_score {
            Some(score) => format!(
                "Parity score {} vs threshold {}",
                score, config.parity_threshold
            ),
            None => "No parity score recorded".to_string(),
        },
    ));

    let backfill_ok = state.backfill_complete();
    checks.push(check(
        "backfill_complete",
        "Backfill copied every row",
        Severity::Blocker,
        backfill_ok,
        format!(
            "{} of {} rows migrated",
            state.backfill.rows_migrated, state.backfill.rows_total
        ),
    ));

    let clean = state.backfill.last_error.is_none();
    checks.push(check(
        "backfill_errors",
        "Backfill finished without row errors",
        Severity::Warning,
        clean,
        state
            .backfill
            .last_error
            .clone()
            .unwrap_or_else(|| "No backfill errors recorded".to_string()),
    ));

    checks.push(check(
        "dual_write_enabled",
        "Dual-write covers the delta window",
        Severity::Warning,
        state.dual_write_enabled,
        if state.dual_write_enabled {
            "Dual-write is active".to_string()
        } else {
            "Dual-write is not active; writes during cutover may be lost".to_string()
        },
    ));

    match counts {
        Ok((source, target)) => {
            let drift = source.abs_diff(target);
            checks.push(check(
                "row_count_drift",
                "Source and target row counts agree",
                Severity::Warning,
                drift <= config.row_drift_tolerance,
                format!("source={} target={} drift={}", source, target, drift),
            ));
        }
        Err(message) => {
            checks.push(check(
                "row_count_drift",
                "Source and target row counts agree",
                Severity::Warning,
                false,
                format!("Count query failed: {}", message),
            ));
        }
    }

    checks
}

/// Fold a check list into the readiness signal.
pub(crate) fn readiness_from(checks: &[PreCheckResult]) -> Readiness {
    let blockers: Vec<PreCheckResult> = checks
        .iter()
        .filter(|c| c.is_blocking())
        .cloned()
        .collect();
    Readiness {
        ready: blockers.is_empty(),
        blockers,
    }
}
