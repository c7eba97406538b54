use std::sync::Arc;

use colloquy_llm::Message;

use crate::store::ContextStore;

/// Histories at or below this length are always sent upstream unchanged
pub const COMPACTION_THRESHOLD: usize = 10;

const SUMMARY_PREFIX: &str = "Summary of previous conversation: ";

/// Decides what to actually send upstream for a turn
///
/// The common case is pass-through: memory disabled, or a short history.
/// Once memory is enabled, the history is long, and a summary has been
/// stored, the full history is replaced by a synthetic system message
/// carrying the summary plus the most recent message only.
pub struct ContextBuilder {
    store: Arc<ContextStore>,
}

impl ContextBuilder {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self { store }
    }

    /// Build the upstream message list from a thread's full history
    ///
    /// Pure over one store snapshot; never fails.
    pub async fn build(&self, thread_id: &str, history: &[Message]) -> Vec<Message> {
        let entry = self.store.snapshot(thread_id).await;

        if !entry.memory_enabled || history.len() <= COMPACTION_THRESHOLD {
            return history.to_vec();
        }

        match entry.summary {
            Some(summary) => {
                let mut compacted =
                    vec![Message::system(format!("{}{}", SUMMARY_PREFIX, summary))];
                compacted.extend(history.last().cloned());
                compacted
            }
            // Memory is on and the history is long, but no summary has
            // been generated yet: send everything
            None => history.to_vec(),
        }
    }
}
