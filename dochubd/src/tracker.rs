use std::collections::HashMap;
use std::sync::Arc;

use dochub_core::RunRecord;
use tokio::sync::RwLock;

/// Live run records keyed by run id.
///
/// There is no ambient singleton: every consumer holds a clone of the
/// tracker and reads snapshots, while the engine owning a run is the only
/// publisher for that id. A record that reached a terminal state is
/// frozen; later publishes for the same id are refused.
#[derive(Clone, Default)]
pub struct RunTracker {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
}

impl RunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fresh record under its id.
    pub async fn begin(&self, record: RunRecord) {
        let mut runs = self.runs.write().await;
        runs.insert(record.id.clone(), record);
    }

    /// Replaces the stored record with a newer snapshot of the same run.
    /// Returns false when the stored record already finished.
    pub async fn publish(&self, record: &RunRecord) -> bool {
        let mut runs = self.runs.write().await;
        match runs.get(&record.id) {
            Some(existing) if existing.is_finished() => false,
            _ => {
                runs.insert(record.id.clone(), record.clone());
                true
            }
        }
    }

    pub async fn snapshot(&self, run_id: &str) -> Option<RunRecord> {
        let runs = self.runs.read().await;
        runs.get(run_id).cloned()
    }

    /// Drops a record, returning its final state.
    pub async fn remove(&self, run_id: &str) -> Option<RunRecord> {
        let mut runs = self.runs.write().await;
        runs.remove(run_id)
    }
}
