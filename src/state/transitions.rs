//! The legal state-transition table.
//!
//! Forward chain: idle -> dual_write -> backfilling -> verifying ->
//! cutover_ready -> cutover_complete. Rollback reaches rolled_back from any
//! non-idle status including a completed cutover; failed is reachable from the
//! two engine-driven phases.

use crate::core::MigrationStatus;

/// Allowed destination statuses from `status`.
pub fn allowed_transitions(status: MigrationStatus) -> &'static [MigrationStatus] {
    use MigrationStatus::*;
    match status {
        Idle => &[DualWrite],
        DualWrite => &[Backfilling, RolledBack],
        Backfilling => &[Verifying, Failed, RolledBack],
        Verifying => &[CutoverReady, Failed, RolledBack],
        CutoverReady => &[CutoverComplete, RolledBack],
        CutoverComplete => &[RolledBack],
        Failed => &[RolledBack],
        RolledBack => &[],
    }
}

pub fn is_legal(from: MigrationStatus, to: MigrationStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Comma-separated allowed destinations, for error messages.
pub fn allowed_as_string(from: MigrationStatus) -> String {
    allowed_transitions(from)
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use MigrationStatus::*;

    #[test]
    fn forward_chain_is_legal() {
        let chain = [Idle, DualWrite, Backfilling, Verifying, CutoverReady, CutoverComplete];
        for pair in chain.windows(2) {
            assert!(is_legal(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn rollback_reachable_from_every_non_idle_status() {
        for from in [DualWrite, Backfilling, Verifying, CutoverReady, CutoverComplete, Failed] {
            assert!(is_legal(from, RolledBack), "{} -> rolled_back", from);
        }
        assert!(!is_legal(Idle, RolledBack));
    }

    #[test]
    fn failed_only_from_engine_phases() {
        assert!(is_legal(Backfilling, Failed));
        assert!(is_legal(Verifying, Failed));
        assert!(!is_legal(Idle, Failed));
        assert!(!is_legal(DualWrite, Failed));
        assert!(!is_legal(CutoverReady, Failed));
        assert!(!is_legal(CutoverComplete, Failed));
    }

    #[test]
    fn no_skipping_forward() {
        assert!(!is_legal(Idle, Backfilling));
        assert!(!is_legal(DualWrite, Verifying));
        assert!(!is_legal(Backfilling, CutoverReady));
        assert!(!is_legal(Verifying, CutoverComplete));
    }

    #[test]
    fn rolled_back_is_terminal() {
        assert!(allowed_transitions(RolledBack).is_empty());
    }
}
