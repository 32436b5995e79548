pub mod manager;
pub mod prechecks;
pub mod steps;

pub use manager::CutoverManager;
pub use prechecks::Readiness;
pub use steps::CutoverStepKind;
