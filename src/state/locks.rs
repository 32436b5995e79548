use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-tenant mutual exclusion.
///
/// Cutover mutates the shared state record across multiple non-atomic steps, so
/// `execute`, `rollback` and backfill batch advance on the same workspace must
/// serialize. Locks are created lazily per workspace and never removed; the
/// registry is bounded by the number of tenants ever migrated in-process.
#[derive(Default)]
pub struct TenantLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TenantLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a workspace, waiting if another migration operation
    /// on the same tenant is in flight.
    pub async fn acquire(&self, workspace_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(workspace_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
