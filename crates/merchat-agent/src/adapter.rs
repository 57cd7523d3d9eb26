use merchat_core::ids::{ConversationId, UserKey};
use merchat_core::Event;
use merchat_store::CredentialStore;
use tracing::{instrument, warn};

use crate::client::{AgentClient, Reply, ReplyKind};
use crate::prompt::{normalize, to_content_parts};

/// Sentinel text returned when the agent call fails so the handler chain
/// still produces a visible outcome for the end user (§4.9).
pub const PROCESSING_FAILED_TEXT: &str = "processing failed";

/// Binds the agent client to per-user conversation state in the credential
/// store (§4.9's conversation management section).
pub struct AgentAdapter {
    client: AgentClient,
    store: std::sync::Arc<CredentialStore>,
}

impl AgentAdapter {
    pub fn new(client: AgentClient, store: std::sync::Arc<CredentialStore>) -> Self {
        Self { client, store }
    }

    #[instrument(skip(self, event), fields(msg_id = %event.msg_id))]
    pub async fn reply_for(&self, event: &Event) -> Reply {
        let Some(prompt) = normalize(&event.kind) else {
            warn!(?event.kind, "agent adapter invoked for an unsupported event kind");
            return Reply { kind: ReplyKind::Text, content: PROCESSING_FAILED_TEXT.to_string() };
        };

        let user_key = UserKey::new(&event.shop_id, &event.from_uid);

        let conversation_id = match self.conversation_id_for(&user_key).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "conversation setup failed");
                return Reply { kind: ReplyKind::Text, content: PROCESSING_FAILED_TEXT.to_string() };
            }
        };

        let parts = to_content_parts(&prompt);
        match self.client.send_and_poll(conversation_id.as_str(), &event.from_uid, &parts).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "agent call failed");
                Reply { kind: ReplyKind::Text, content: PROCESSING_FAILED_TEXT.to_string() }
            }
        }
    }

    async fn conversation_id_for(&self, user_key: &UserKey) -> crate::error::Result<ConversationId> {
        if let Ok(Some(existing)) = self.store.get_conversation(user_key.as_str()) {
            return Ok(existing.conversation_id);
        }

        let created = self
            .client
            .create_conversation()
            .await
            .map_err(|e| crate::error::AgentError::ConversationCreateFailed(e.to_string()))?;
        let conversation_id = ConversationId::new(created);

        if let Err(e) = self.store.set_conversation(user_key.as_str(), &conversation_id) {
            warn!(error = %e, "failed to persist new conversation id");
        }

        Ok(conversation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchat_core::ids::{AccountUserId, ShopId};
    use merchat_core::{EventKind, FromRole};
    use serde_json::Value;

    #[tokio::test]
    async fn unsupported_kind_yields_sentinel_without_network() {
        let store = std::sync::Arc::new(CredentialStore::in_memory().unwrap());
        let client = AgentClient::new("http://example.invalid", "token", "bot");
        let adapter = AgentAdapter::new(client, store);

        let event = Event {
            kind: EventKind::Unknown { raw: Value::Null },
            msg_id: "m1".into(),
            from_role: FromRole::User,
            from_uid: "U1".into(),
            to_uid: "CS1".into(),
            nickname: None,
            timestamp: 0,
            shop_id: ShopId::new("shop1"),
            account_user_id: AccountUserId::new("acc1"),
            raw: Value::Null,
        };

        let reply = adapter.reply_for(&event).await;
        assert_eq!(reply.content, PROCESSING_FAILED_TEXT);
    }
}
