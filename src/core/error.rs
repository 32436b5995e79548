use crate::core::types::MigrationStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migration for workspace '{0}' already exists")]
    AlreadyExists(String),

    #[error("Migration for workspace '{0}' not found")]
    NotFound(String),

    #[error(
        "Illegal transition '{from}' -> '{to}' for workspace '{workspace}'; allowed from '{from}': [{allowed}]"
    )]
    IllegalTransition {
        workspace: String,
        from: MigrationStatus,
        to: MigrationStatus,
        allowed: String,
    },

    #[error("Cannot start cutover in '{0}' state")]
    CutoverNotAllowed(MigrationStatus),

    #[error("Invalid backfill progress for workspace '{workspace}': {reason}")]
    InvalidProgress { workspace: String, reason: String },

    #[error("Parity score cannot be recorded in '{0}' state")]
    ParityUnavailable(MigrationStatus),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for MigrationError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for MigrationError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
