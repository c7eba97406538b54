use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;

use colloquy_llm::{ChatClient, ChatRequest, Message, StreamEvent};
use colloquy_memory::{ContextBuilder, ContextStore, SummaryUpdater};

use crate::events::{RelayEvent, UsageRecord};
use crate::pricing::PriceTable;

/// One turn, as handed over by the transport layer
///
/// `model` is already resolved (request override, then transport override,
/// then configured default). `thread_id` is mandatory on the persistent
/// channel and optional for one-shot requests; without it the turn runs
/// memoryless.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub thread_id: Option<String>,
    pub model: String,
    pub messages: Vec<Message>,
}

/// Orchestrates conversation turns against the upstream completion service
///
/// Each turn runs as a spawned task emitting `RelayEvent`s over a channel;
/// the transport (HTTP body or WebSocket loop) drains the receiver. The
/// task forwards tokens as they arrive, then finalizes: authoritative
/// usage, cost, terminal events, summary maintenance.
pub struct RelaySession {
    client: Arc<dyn ChatClient>,
    store: Arc<ContextStore>,
    builder: Arc<ContextBuilder>,
    summarizer: Arc<SummaryUpdater>,
    pricing: Arc<PriceTable>,
}

impl RelaySession {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<ContextStore>,
        pricing: PriceTable,
    ) -> Self {
        Self {
            builder: Arc::new(ContextBuilder::new(Arc::clone(&store))),
            summarizer: Arc::new(SummaryUpdater::new(Arc::clone(&store), Arc::clone(&client))),
            client,
            store,
            pricing: Arc::new(pricing),
        }
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    /// Spawn a turn in the background, return its event receiver
    ///
    /// Dropping the receiver cancels the turn: the first failed send
    /// abandons it with no usage event and no summary write.
    pub fn spawn_turn(&self, turn: TurnRequest) -> mpsc::Receiver<RelayEvent> {
        let (tx, rx) = mpsc::channel(1000);

        let client = Arc::clone(&self.client);
        let store = Arc::clone(&self.store);
        let builder = Arc::clone(&self.builder);
        let summarizer = Arc::clone(&self.summarizer);
        let pricing = Arc::clone(&self.pricing);

        tokio::spawn(async move {
            Self::run_turn(turn, tx, client, store, builder, summarizer, pricing).await;
        });

        rx
    }

    async fn run_turn(
        turn: TurnRequest,
        tx: mpsc::Sender<RelayEvent>,
        client: Arc<dyn ChatClient>,
        store: Arc<ContextStore>,
        builder: Arc<ContextBuilder>,
        summarizer: Arc<SummaryUpdater>,
        pricing: Arc<PriceTable>,
    ) {
        // Turns on the same thread serialize: the guard is held until the
        // summary write below has finished, so the next turn's context
        // build always sees it
        let _turn_guard = match &turn.thread_id {
            Some(thread_id) => Some(store.lock_turn(thread_id).await),
            None => None,
        };

        let upstream_messages = match &turn.thread_id {
            Some(thread_id) => builder.build(thread_id, &turn.messages).await,
            None => turn.messages.clone(),
        };

        let request = ChatRequest::new(turn.model.clone(), upstream_messages.clone());
        let mut stream = match client.chat_stream(request).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(model = %turn.model, error = %e, "upstream request failed");
                let _ = tx.send(RelayEvent::Error { message: e.to_string() }).await;
                let _ = tx.send(RelayEvent::EndOfStream).await;
                return;
            }
        };

        let mut reply = String::new();
        while let Some(event) = stream.next().await {
            match event {
                Ok(StreamEvent::Message { content }) => {
                    reply.push_str(&content);
                    if tx.send(RelayEvent::Token { content }).await.is_err() {
                        // Client disconnected; the turn is dropped whole
                        tracing::debug!("client gone mid-stream, abandoning turn");
                        return;
                    }
                }
                Ok(StreamEvent::Done { .. }) => break,
                Err(e) => {
                    tracing::warn!(model = %turn.model, error = %e, "upstream stream failed mid-turn");
                    let _ = tx.send(RelayEvent::Error { message: e.to_string() }).await;
                    let _ = tx.send(RelayEvent::EndOfStream).await;
                    return;
                }
            }
        }

        // Per-chunk events carry no token counts; the authoritative usage
        // comes from a second, non-streaming call with identical inputs
        match client
            .chat(ChatRequest::new(turn.model.clone(), upstream_messages))
            .await
        {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    let cost =
                        pricing.cost(&turn.model, usage.prompt_tokens, usage.completion_tokens);
                    let record = UsageRecord {
                        prompt_tokens: usage.prompt_tokens,
                        completion_tokens: usage.completion_tokens,
                        total_tokens: usage.total_tokens,
                        cost,
                    };
                    if tx.send(RelayEvent::Usage { usage: record }).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(model = %turn.model, error = %e, "usage lookup failed, emitting no usage event");
            }
        }

        if tx.send(RelayEvent::EndOfStream).await.is_err() {
            return;
        }

        // The client already has its usage and end marker; only the next
        // turn on this thread waits for the summary
        if let Some(thread_id) = &turn.thread_id {
            let mut full_history = turn.messages;
            full_history.push(Message::assistant(reply));
            summarizer.after_turn(thread_id, &full_history).await;
        }
    }
}
