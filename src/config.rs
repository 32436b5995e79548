use std::time::Duration;

/// Backfill copier configuration
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    /// Rows fetched per keyset batch
    pub batch_size: usize,

    /// Consecutive batches without cursor progress before the migration is failed
    pub max_stalled_batches: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_stalled_batches: 3,
        }
    }
}

impl BackfillConfig {
    /// Set the batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the stall tolerance
    pub fn max_stalled_batches(mut self, max: u32) -> Self {
        self.max_stalled_batches = max.max(1);
        self
    }
}

/// Parity verifier configuration
#[derive(Debug, Clone)]
pub struct ParityConfig {
    /// Maximum rows included in the content comparison sample
    pub sample_size: usize,
}

impl Default for ParityConfig {
    fn default() -> Self {
        Self { sample_size: 256 }
    }
}

impl ParityConfig {
    /// Set the content sample size
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }
}

/// Cutover gate configuration
#[derive(Debug, Clone)]
pub struct CutoverConfig {
    /// Minimum parity score required to pass the cutover gate
    pub parity_threshold: u8,

    /// Per-step timeout; expiry is reported as a step failure
    pub step_timeout: Duration,

    /// Allowed absolute difference between source and target row counts before
    /// the advisory drift check warns
    pub row_drift_tolerance: u64,
}

impl Default for CutoverConfig {
    fn default() -> Self {
        Self {
            parity_threshold: 90,
            step_timeout: Duration::from_secs(30),
            row_drift_tolerance: 0,
        }
    }
}

impl CutoverConfig {
    /// Set the parity gate threshold
    pub fn parity_threshold(mut self, threshold: u8) -> Self {
        self.parity_threshold = threshold.min(100);
        self
    }

    /// Set the per-step timeout
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Set the row count drift tolerance
    pub fn row_drift_tolerance(mut self, tolerance: u64) -> Self {
        self.row_drift_tolerance = tolerance;
        self
    }
}

/// Top-level configuration passed to the orchestrator at construction.
///
/// Thresholds live here rather than in module-level constants so embedders can
/// tune them per deployment.
#[derive(Debug, Clone, Default)]
pub struct MigrationConfig {
    pub backfill: BackfillConfig,
    pub parity: ParityConfig,
    pub cutover: CutoverConfig,
}

impl MigrationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the backfill section
    pub fn backfill(mut self, backfill: BackfillConfig) -> Self {
        self.backfill = backfill;
        self
    }

    /// Replace the parity section
    pub fn parity(mut self, parity: ParityConfig) -> Self {
        self.parity = parity;
        self
    }

    /// Replace the cutover section
    pub fn cutover(mut self, cutover: CutoverConfig) -> Self {
        self.cutover = cutover;
        self
    }
}
