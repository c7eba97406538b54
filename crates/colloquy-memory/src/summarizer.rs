use std::sync::Arc;

use colloquy_llm::{ChatClient, ChatRequest, Message};

use crate::builder::COMPACTION_THRESHOLD;
use crate::store::ContextStore;

/// Summaries always go through the small model, whatever the turn used
pub const SUMMARY_MODEL: &str = "gpt-4o-mini";

const SUMMARY_INSTRUCTION: &str = "Summarize the following in 50 tokens or less.";

/// Maintains the rolling summary after each completed turn
pub struct SummaryUpdater {
    store: Arc<ContextStore>,
    client: Arc<dyn ChatClient>,
}

impl SummaryUpdater {
    pub fn new(store: Arc<ContextStore>, client: Arc<dyn ChatClient>) -> Self {
        Self { store, client }
    }

    /// Refresh the thread's summary from the latest assistant reply
    ///
    /// No-op unless memory is enabled and the history has grown past the
    /// compaction threshold. The summarization call is best-effort: a
    /// failure is logged and the previous summary kept, and nothing here
    /// can fail the primary response already delivered to the client.
    pub async fn after_turn(&self, thread_id: &str, history: &[Message]) {
        let entry = self.store.snapshot(thread_id).await;
        if !entry.memory_enabled || history.len() <= COMPACTION_THRESHOLD {
            return;
        }

        let Some(last_assistant) = history.iter().rev().find(|m| m.is_assistant()) else {
            return;
        };

        let request = ChatRequest::new(
            SUMMARY_MODEL,
            vec![
                Message::system(SUMMARY_INSTRUCTION),
                Message::user(last_assistant.content()),
            ],
        );

        match self.client.chat(request).await {
            Ok(response) => {
                if let Some(summary) = response.content {
                    self.store.set_summary(thread_id, summary).await;
                }
            }
            Err(e) => {
                tracing::warn!(thread_id, error = %e, "summary generation failed, keeping previous summary");
            }
        }
    }
}
