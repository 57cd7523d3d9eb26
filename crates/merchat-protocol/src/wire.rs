use serde::Deserialize;
use serde_json::Value;

/// Raw inbound WS frame shapes (§6.1). `response` is the discriminator;
/// every other field is read defensively since the platform's shapes are
/// loosely typed in practice.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFrame {
    pub response: Option<String>,
    pub message: Option<RawMessage>,
    pub uid: Option<String>,
    pub auth: Option<RawAuth>,
    pub status: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(rename = "type")]
    pub msg_type: Option<i64>,
    pub sub_type: Option<i64>,
    pub from: Option<RawParty>,
    pub to: Option<RawParty>,
    pub msg_id: Option<String>,
    pub nickname: Option<String>,
    pub time: Option<i64>,
    pub content: Option<Value>,
    pub info: Option<Value>,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawParty {
    pub role: Option<String>,
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAuth {
    pub result: Option<String>,
}
