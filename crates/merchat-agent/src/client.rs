use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::sleep;

use crate::error::{AgentError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const POLL_MAX_ATTEMPTS: u32 = 40; // ~20s

/// One reply extracted from the agent's message list (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub kind: ReplyKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Text,
}

/// Thin HTTP client for the external conversational agent (§6.3's
/// counterpart for the agent backend, §4.9). Treated as an opaque
/// request/response service; the wire shape below mirrors a conversation
/// create / message-create / chat-and-poll flow, the shape the reference
/// bot integration uses.
pub struct AgentClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    bot_id: String,
}

impl AgentClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, bot_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
            bot_id: bot_id.into(),
        }
    }

    pub async fn create_conversation(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/v1/conversation/create", self.endpoint))
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?;

        let value: Value = resp.json().await.map_err(|e| AgentError::AgentUnreachable(e.to_string()))?;
        value
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| AgentError::ConversationCreateFailed("no conversation id in response".into()))
    }

    /// Posts the normalized prompt, then polls the chat to completion,
    /// mirroring `create_and_poll(auto_save_history=true)`.
    pub async fn send_and_poll(&self, conversation_id: &str, from_uid: &str, content_parts: &Value) -> Result<Reply> {
        let message = self
            .http
            .post(format!("{}/v1/conversation/message/create", self.endpoint))
            .bearer_auth(&self.token)
            .query(&[("conversation_id", conversation_id)])
            .json(&json!({ "role": "user", "content_type": "object_string", "content": content_parts }))
            .send()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?;

        let message_id = message.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        let chat = self
            .http
            .post(format!("{}/v1/chat", self.endpoint))
            .bearer_auth(&self.token)
            .json(&json!({
                "conversation_id": conversation_id,
                "bot_id": self.bot_id,
                "user_id": from_uid,
                "additional_messages": [{ "id": message_id }],
                "auto_save_history": true,
            }))
            .send()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?;

        let chat_id = chat.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        for _ in 0..POLL_MAX_ATTEMPTS {
            let status_resp: Value = self
                .http
                .get(format!("{}/v1/chat/retrieve", self.endpoint))
                .bearer_auth(&self.token)
                .query(&[("conversation_id", conversation_id), ("chat_id", &chat_id)])
                .send()
                .await
                .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?
                .json()
                .await
                .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?;

            match status_resp.get("status").and_then(|v| v.as_str()) {
                Some("completed") => {
                    return self.fetch_reply(conversation_id, &chat_id).await;
                }
                Some("failed") | Some("canceled") => {
                    return Err(AgentError::AgentUnreachable("chat run failed".into()));
                }
                _ => sleep(POLL_INTERVAL).await,
            }
        }

        Err(AgentError::AgentTimeout)
    }

    async fn fetch_reply(&self, conversation_id: &str, chat_id: &str) -> Result<Reply> {
        let resp: Value = self
            .http
            .get(format!("{}/v1/chat/message/list", self.endpoint))
            .bearer_auth(&self.token)
            .query(&[("conversation_id", conversation_id), ("chat_id", chat_id)])
            .send()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AgentError::AgentUnreachable(e.to_string()))?;

        let messages = resp.get("data").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let text = messages.iter().find_map(|m| {
            let is_answer = m.get("type").and_then(|v| v.as_str()) == Some("answer");
            let is_text = m.get("content_type").and_then(|v| v.as_str()) == Some("text");
            if is_answer && is_text {
                m.get("content").and_then(|v| v.as_str()).map(|s| s.to_string())
            } else {
                None
            }
        });

        Ok(Reply { kind: ReplyKind::Text, content: text.unwrap_or_else(|| "(no reply)".to_string()) })
    }
}
