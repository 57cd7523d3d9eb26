use merchat_core::{Account, Event, EventKind};
use merchat_platform::PlatformClient;
use tracing::{info, warn};

/// Handles an event whose routing policy is `Immediate` (§4.7): small,
/// bounded work that bypasses the per-user dispatcher entirely.
pub async fn handle_immediate(platform: &PlatformClient, account: &Account, event: &Event) {
    match &event.kind {
        EventKind::Auth { result, .. } => {
            info!(result = ?result, "auth status recorded");
        }
        EventKind::Withdraw { hint } => {
            info!(hint = ?hint, "message withdrawal acknowledged");
            if let Err(e) = platform.send_text(account, &event.from_uid, "[玫瑰]").await {
                warn!(error = %e, "failed to acknowledge withdrawal");
            }
        }
        EventKind::Transfer { to_uid, .. } => {
            let target = to_uid.clone().unwrap_or_else(|| event.to_uid.clone());
            if let Err(e) = platform.transfer_conversation(account, &event.from_uid, &target).await {
                warn!(error = %e, "transfer_conversation failed");
            }
        }
        EventKind::MallCs { text } => {
            info!(text = ?text, "observed another seat's outbound message");
        }
        EventKind::MallSystemMsg { user_id } => {
            info!(user_id = ?user_id, "mall system message recorded");
        }
        EventKind::SystemStatus { text } | EventKind::SystemHint { text } | EventKind::SystemBiz { text } => {
            info!(text = %text, "system status message recorded");
        }
        other => {
            warn!(?other, "unexpected event kind routed as immediate");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchat_core::ids::{AccountUserId, ShopId};
    use merchat_core::FromRole;
    use merchat_platform::{FixtureLoginProvider, RetryPolicy};
    use merchat_store::CredentialStore;
    use serde_json::Value;
    use std::sync::Arc;

    fn sample_account() -> Account {
        Account {
            channel: "pinduoduo".into(),
            shop_id: ShopId::new("shop1"),
            account_user_id: AccountUserId::new("cs1"),
            username: "u".into(),
            password: "p".into(),
            profile_dir: None,
            credentials: Some(serde_json::json!({ "cookie": "abc" })),
            presence: merchat_core::Presence::Online,
            created_at: "".into(),
            updated_at: "".into(),
        }
    }

    #[tokio::test]
    async fn auth_event_does_not_panic() {
        let store = Arc::new(CredentialStore::in_memory().unwrap());
        let platform = PlatformClient::new("http://example.invalid", store, Arc::new(FixtureLoginProvider), RetryPolicy::default());
        let account = sample_account();
        let event = Event {
            kind: EventKind::Auth { uid: None, result: Some("ok".into()), status: None },
            msg_id: "m1".into(),
            from_role: FromRole::User,
            from_uid: "U1".into(),
            to_uid: "CS1".into(),
            nickname: None,
            timestamp: 0,
            shop_id: ShopId::new("shop1"),
            account_user_id: AccountUserId::new("cs1"),
            raw: Value::Null,
        };
        handle_immediate(&platform, &account, &event).await;
    }
}
