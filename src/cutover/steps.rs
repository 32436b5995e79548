//! The fixed cutover sequence.
//!
//! Step identity and order are a contract: nothing destructive runs before the
//! pre-check step passes, the read path swaps only after the final parity gate,
//! and state finalization is last so an abort at any point leaves the record on
//! its pre-cutover status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The eight cutover steps, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CutoverStepKind {
    RunPrechecks,
    FreezeDualWrite,
    FinalDeltaSync,
    FinalParityCheck,
    SwapReadPath,
    DisableDualWrite,
    ArchiveSource,
    FinalizeState,
}

impl CutoverStepKind {
    /// Execution order. `execute` walks this sequence strictly left to right.
    pub const SEQUENCE: [CutoverStepKind; 8] = [
        Self::RunPrechecks,
        Self::FreezeDualWrite,
        Self::FinalDeltaSync,
        Self::FinalParityCheck,
        Self::SwapReadPath,
        Self::DisableDualWrite,
        Self::ArchiveSource,
        Self::FinalizeState,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunPrechecks => "run_prechecks",
            Self::FreezeDualWrite => "freeze_dual_write",
            Self::FinalDeltaSync => "final_delta_sync",
            Self::FinalParityCheck => "final_parity_check",
            Self::SwapReadPath => "swap_read_path",
            Self::DisableDualWrite => "disable_dual_write",
            Self::ArchiveSource => "archive_source",
            Self::FinalizeState => "finalize_state",
        }
    }
}

impl fmt::Display for CutoverStepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
