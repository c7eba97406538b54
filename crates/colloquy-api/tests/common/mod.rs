use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;

use colloquy_api::config::{Config, CorsConfig, LlmConfig, LoggingConfig, ServerConfig};
use colloquy_api::state::AppState;
use colloquy_api::build_router;
use colloquy_llm::{ChatClient, ChatRequest, ChatResponse, StreamEvent, TokenUsage};
use colloquy_memory::ContextStore;
use colloquy_relay::{PriceTable, RelaySession};

/// ChatClient scripted for transport-level tests; records the models it
/// was asked for so override precedence can be asserted
pub struct ScriptedClient {
    pub tokens: Vec<&'static str>,
    pub fail_mid_stream: bool,
    pub seen_models: Mutex<Vec<String>>,
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self {
            tokens: vec!["Hello", ", ", "world"],
            fail_mid_stream: false,
            seen_models: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedClient {
    pub fn failing() -> Self {
        Self {
            fail_mid_stream: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.seen_models.lock().unwrap().push(request.model);
        Ok(ChatResponse {
            content: Some("scripted reply".to_string()),
            usage: Some(TokenUsage {
                prompt_tokens: 1000,
                completion_tokens: 1000,
                total_tokens: 2000,
            }),
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn chat_stream(
        &self,
        request: ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>> {
        self.seen_models.lock().unwrap().push(request.model);

        let mut events: Vec<Result<StreamEvent>> = self
            .tokens
            .iter()
            .map(|t| {
                Ok(StreamEvent::Message {
                    content: t.to_string(),
                })
            })
            .collect();

        if self.fail_mid_stream {
            events.push(Err(anyhow::anyhow!("stream reset by peer")));
        } else {
            events.push(Ok(StreamEvent::Done {
                finish_reason: Some("stop".to_string()),
            }));
        }

        Ok(Box::pin(futures::stream::iter(events)))
    }
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        cors: CorsConfig {
            enabled: false,
            origins: vec![],
        },
        llm: LlmConfig {
            model: "default-model".to_string(),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        openai_api_key: "test-key".to_string(),
    }
}

/// Bind a relay server on an ephemeral port; returns `host:port`
pub async fn start_server(client: Arc<ScriptedClient>) -> String {
    let store = Arc::new(ContextStore::new());
    let relay = Arc::new(RelaySession::new(
        client as Arc<dyn ChatClient>,
        store,
        PriceTable::default(),
    ));
    let state = Arc::new(AppState::new(test_config(), relay));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("127.0.0.1:{}", addr.port())
}
