use async_trait::async_trait;
use merchat_core::{Account, Event, EventKind, Handler, Result};
use merchat_platform::PlatformClient;
use merchat_store::CredentialStore;
use tracing::warn;

const NO_AGENT_AVAILABLE_TEXT: &str = "当前没有可转接的人工客服，请稍后再试";

/// Accepts `Text` events whose content contains a keyword sourced from the
/// credential store's `keywords` table (§4.8, §3 supplemental Keyword
/// entity).
pub struct TransferToHumanHandler {
    keywords: Vec<String>,
    platform: std::sync::Arc<PlatformClient>,
    account: Account,
}

impl TransferToHumanHandler {
    pub fn load(store: &CredentialStore, channel: &str, platform: std::sync::Arc<PlatformClient>, account: Account) -> Self {
        let keywords = store
            .list_keywords(channel)
            .map(|rows| rows.into_iter().map(|k| k.keyword).collect())
            .unwrap_or_default();
        Self { keywords, platform, account }
    }
}

#[async_trait]
impl Handler for TransferToHumanHandler {
    fn name(&self) -> &'static str {
        "transfer_to_human"
    }

    fn accepts(&self, event: &Event) -> bool {
        match &event.kind {
            EventKind::Text { text } => self.keywords.iter().any(|k| text.contains(k.as_str())),
            _ => false,
        }
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let list = match self.platform.assign_cs_list(&self.account).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to fetch assignable CS list");
                self.reply_no_agent(event).await;
                return Ok(());
            }
        };

        let own_id = self.account.account_user_id.as_str();
        let candidate = list
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.get("uid").and_then(|v| v.as_str()))
            .find(|uid| *uid != own_id)
            .map(|s| s.to_string());

        match candidate {
            Some(cs_uid) => {
                if let Err(e) = self.platform.transfer_conversation(&self.account, &event.from_uid, &cs_uid).await {
                    warn!(error = %e, "transfer_conversation failed");
                    self.reply_no_agent(event).await;
                }
            }
            None => self.reply_no_agent(event).await,
        }
        Ok(())
    }
}

impl TransferToHumanHandler {
    async fn reply_no_agent(&self, event: &Event) {
        if let Err(e) = self.platform.send_text(&self.account, &event.from_uid, NO_AGENT_AVAILABLE_TEXT).await {
            warn!(error = %e, "failed to send no-agent-available reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match() {
        let keywords = vec!["转人工".to_string(), "投诉".to_string()];
        assert!(keywords.iter().any(|k| "我要转人工处理".contains(k.as_str())));
        assert!(!keywords.iter().any(|k| "你好".contains(k.as_str())));
    }
}
