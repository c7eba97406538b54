use serde::{Deserialize, Serialize};

/// Token counts and derived cost for one completed turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost: f64,
}

/// Events a relay turn emits toward the transport layer
///
/// `Token` carries raw reply text and is forwarded as-is. `Usage` is the
/// single terminal accounting event, serialized on the wire as
/// `{"type":"usage","usage":{...}}`. `EndOfStream` marks the turn
/// boundary and is distinct from the usage event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    Token { content: String },

    Usage { usage: UsageRecord },

    Error { message: String },

    EndOfStream,
}
