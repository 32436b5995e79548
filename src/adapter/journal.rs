//! Durable audit journal and state snapshots for the migration data plane.

use crate::adapter::DataPlane;
use crate::core::{
    BatchInsertOutcome, MigrationError, MigrationEvent, MigrationState, Result, SourceRow,
    StateFilter,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

// ============================================================================
// Event Journal
// ============================================================================

/// Append-only file journal of migration events.
///
/// Entries are length-prefixed MessagePack frames; append order on disk is the
/// audit trail, so entries are flushed per append.
pub struct EventJournal {
    journal_path: PathBuf,
    journal_file: BufWriter<File>,
}

impl EventJournal {
    pub fn open<P: AsRef<Path>>(journal_path: P) -> Result<Self> {
        let journal_path = journal_path.as_ref().to_path_buf();
        if let Some(parent) = journal_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MigrationError::Io(format!("Failed to create journal directory: {}", e)))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&journal_path)
            .map_err(|e| MigrationError::Io(format!("Failed to open journal file: {}", e)))?;
        Ok(Self {
            journal_path,
            journal_file: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, event: &MigrationEvent) -> Result<()> {
        let serialized = rmp_serde::to_vec(event)?;
        let len = serialized.len() as u32;
        self.journal_file.write_all(&len.to_le_bytes())?;
        self.journal_file.write_all(&serialized)?;
        self.journal_file.flush()?;
        Ok(())
    }

    /// Read every journaled event, oldest first.
    pub fn read_all(&self) -> Result<Vec<MigrationEvent>> {
        Self::read_path(&self.journal_path)
    }

    /// Read a journal file without holding it open for appends.
    pub fn read_path<P: AsRef<Path>>(path: P) -> Result<Vec<MigrationEvent>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)
            .map_err(|e| MigrationError::Io(format!("Failed to open journal for reading: {}", e)))?;
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    return Err(MigrationError::Io(format!(
                        "Failed to read journal entry length: {}",
                        e
                    )));
                }
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            reader
                .read_exact(&mut data)
                .map_err(|e| MigrationError::Io(format!("Failed to read journal entry data: {}", e)))?;
            events.push(rmp_serde::from_slice(&data)?);
        }
        Ok(events)
    }

    pub fn clear(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.journal_path)
            .map_err(|e| MigrationError::Io(format!("Failed to truncate journal: {}", e)))?;
        self.journal_file = BufWriter::new(file);
        Ok(())
    }
}

// ============================================================================
// State Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StateSnapshot {
    version: u32,
    states: Vec<MigrationState>,
}

/// Atomic save/load of the full migration state map.
///
/// Writes go to a temp file first and land via rename, so a crash mid-write
/// never corrupts the last good snapshot.
pub struct StateSnapshotFile {
    snapshot_path: PathBuf,
}

impl StateSnapshotFile {
    pub fn new<P: AsRef<Path>>(snapshot_path: P) -> Self {
        Self {
            snapshot_path: snapshot_path.as_ref().to_path_buf(),
        }
    }

    pub fn save(&self, states: &[MigrationState]) -> Result<()> {
        if let Some(parent) = self.snapshot_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MigrationError::Io(format!("Failed to create snapshot directory: {}", e)))?;
        }
        let snapshot = StateSnapshot {
            version: 1,
            states: states.to_vec(),
        };
        let temp_path = self.snapshot_path.with_extension("tmp");
        let temp_file = File::create(&temp_path)
            .map_err(|e| MigrationError::Io(format!("Failed to create temp file: {}", e)))?;
        let mut writer = BufWriter::new(temp_file);
        let serialized = rmp_serde::to_vec(&snapshot)?;
        writer.write_all(&serialized)?;
        writer.flush()?;
        writer
            .get_mut()
            .sync_all()
            .map_err(|e| MigrationError::Io(format!("Failed to sync snapshot: {}", e)))?;
        fs::rename(&temp_path, &self.snapshot_path)
            .map_err(|e| MigrationError::Io(format!("Failed to rename snapshot: {}", e)))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Option<Vec<MigrationState>>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.snapshot_path)
            .map_err(|e| MigrationError::Io(format!("Failed to open snapshot: {}", e)))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| MigrationError::Io(format!("Failed to read snapshot: {}", e)))?;
        let snapshot: StateSnapshot = rmp_serde::from_slice(&data)?;
        Ok(Some(snapshot.states))
    }

    pub fn exists(&self) -> bool {
        self.snapshot_path.exists()
    }
}

// ============================================================================
// Journaling Data Plane
// ============================================================================

/// Decorator that tees every logged event into a durable journal and can
/// checkpoint the state map to a snapshot file.
///
/// An orchestration process that restarts can replay the journal for audit
/// history and reload the snapshot for checkpointed state.
pub struct JournalingDataPlane<P: DataPlane> {
    inner: P,
    journal: Mutex<EventJournal>,
    snapshot: StateSnapshotFile,
}

impl<P: DataPlane> JournalingDataPlane<P> {
    pub fn new(inner: P, data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let journal = EventJournal::open(data_dir.join("migration_events.journal"))?;
        let snapshot = StateSnapshotFile::new(data_dir.join("migration_states.snapshot"));
        Ok(Self {
            inner,
            journal: Mutex::new(journal),
            snapshot,
        })
    }

    /// Persist the current state map.
    pub async fn checkpoint(&self) -> Result<()> {
        let states = self.inner.list_migration_states(None).await?;
        self.snapshot.save(&states)
    }

    /// Restore checkpointed states into the inner plane. Returns how many
    /// records were restored.
    pub async fn restore(&self) -> Result<usize> {
        let Some(states) = self.snapshot.load()? else {
            return Ok(0);
        };
        let count = states.len();
        for state in states {
            self.inner.create_migration_state(state).await?;
        }
        Ok(count)
    }

    pub async fn journaled_events(&self) -> Result<Vec<MigrationEvent>> {
        self.journal.lock().await.read_all()
    }

    /// The wrapped plane, e.g. for seeding in tests.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: DataPlane> DataPlane for JournalingDataPlane<P> {
    async fn get_migration_state(&self, workspace_id: &str) -> Result<Option<MigrationState>> {
        self.inner.get_migration_state(workspace_id).await
    }

    async fn create_migration_state(&self, state: MigrationState) -> Result<()> {
        self.inner.create_migration_state(state).await
    }

    async fn update_migration_state(&self, state: MigrationState) -> Result<()> {
        self.inner.update_migration_state(state).await
    }

    async fn delete_migration_state(&self, workspace_id: &str) -> Result<()> {
        self.inner.delete_migration_state(workspace_id).await
    }

    async fn list_migration_states(
        &self,
        filter: Option<StateFilter>,
    ) -> Result<Vec<MigrationState>> {
        self.inner.list_migration_states(filter).await
    }

    async fn get_source_row_count(&self, table: &str, tenant: &str) -> Result<u64> {
        self.inner.get_source_row_count(table, tenant).await
    }

    async fn get_target_row_count(&self, table: &str, tenant: &str) -> Result<u64> {
        self.inner.get_target_row_count(table, tenant).await
    }

    async fn get_source_batch(
        &self,
        table: &str,
        tenant: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRow>> {
        self.inner.get_source_batch(table, tenant, after_id, limit).await
    }

    async fn get_target_batch(
        &self,
        table: &str,
        tenant: &str,
        after_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceRow>> {
        self.inner.get_target_batch(table, tenant, after_id, limit).await
    }

    async fn insert_target_batch(
        &self,
        table: &str,
        rows: &[SourceRow],
    ) -> Result<BatchInsertOutcome> {
        self.inner.insert_target_batch(table, rows).await
    }

    async fn log_migration_event(&self, event: MigrationEvent) -> Result<()> {
        self.journal.lock().await.append(&event)?;
        self.inner.log_migration_event(event).await
    }

    async fn get_migration_events(
        &self,
        tenant: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MigrationEvent>> {
        self.inner.get_migration_events(tenant, limit).await
    }
}
