use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Per-thread memory state
///
/// `summary`, when present, is the compacted form of the most recent
/// assistant reply observed for the thread while memory was enabled.
#[derive(Debug, Clone, Default)]
pub struct ContextEntry {
    pub memory_enabled: bool,
    pub summary: Option<String>,
}

/// Process-wide store of per-thread memory state
///
/// All operations are total over arbitrary string keys: an unknown thread
/// behaves as a default entry. Entries are created explicitly through
/// `get_or_create` (or the mutating operations) and live for the process
/// lifetime.
///
/// Entry reads and writes go through a single RwLock, so a toggle can
/// never interleave with a snapshot into a torn read. Whole-turn ordering
/// for a thread is handled separately via `lock_turn`.
pub struct ContextStore {
    entries: RwLock<HashMap<String, ContextEntry>>,
    turn_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current state of a thread's entry, without creating one
    ///
    /// Returns a default entry for unknown threads. One read-lock clone,
    /// so callers see a consistent (enabled, summary) pair.
    pub async fn snapshot(&self, thread_id: &str) -> ContextEntry {
        let entries = self.entries.read().await;
        entries.get(thread_id).cloned().unwrap_or_default()
    }

    /// Create the entry if absent and return its current state
    pub async fn get_or_create(&self, thread_id: &str) -> ContextEntry {
        let mut entries = self.entries.write().await;
        entries.entry(thread_id.to_string()).or_default().clone()
    }

    pub async fn is_memory_enabled(&self, thread_id: &str) -> bool {
        self.snapshot(thread_id).await.memory_enabled
    }

    /// Flip the memory flag, creating the entry if absent
    ///
    /// Returns the new state. The flip happens under the write lock, so
    /// concurrent toggles serialize and no reader observes a half-applied
    /// entry.
    pub async fn toggle_memory(&self, thread_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(thread_id.to_string()).or_default();
        entry.memory_enabled = !entry.memory_enabled;
        entry.memory_enabled
    }

    pub async fn summary(&self, thread_id: &str) -> Option<String> {
        self.snapshot(thread_id).await.summary
    }

    /// Replace the stored summary wholesale
    pub async fn set_summary(&self, thread_id: &str, summary: String) {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(thread_id.to_string()).or_default();
        entry.summary = Some(summary);
    }

    /// Acquire the thread's turn lock
    ///
    /// Turns on the same thread run one at a time: the relay holds this
    /// guard from context build until the post-turn summary write has
    /// finished, so turn N+1 always observes turn N's summary. Turns on
    /// different threads never contend.
    pub async fn lock_turn(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            Arc::clone(locks.entry(thread_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
