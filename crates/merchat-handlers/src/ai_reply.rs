use async_trait::async_trait;
use merchat_agent::AgentAdapter;
use merchat_core::{Account, Event, EventKind, Handler, Result};
use merchat_platform::PlatformClient;
use tracing::warn;

/// Last link in the default chain (§4.8): accepts any event kind the agent
/// adapter has a normalized prompt for. Asks C9 for a reply, then sends it.
pub struct AIReplyHandler {
    agent: std::sync::Arc<AgentAdapter>,
    platform: std::sync::Arc<PlatformClient>,
    account: Account,
}

impl AIReplyHandler {
    pub fn new(agent: std::sync::Arc<AgentAdapter>, platform: std::sync::Arc<PlatformClient>, account: Account) -> Self {
        Self { agent, platform, account }
    }
}

fn is_supported(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Text { .. }
            | EventKind::Emotion { .. }
            | EventKind::Image { .. }
            | EventKind::Video { .. }
            | EventKind::GoodsInquiry { .. }
            | EventKind::GoodsSpec { .. }
            | EventKind::OrderInfo { .. }
    )
}

#[async_trait]
impl Handler for AIReplyHandler {
    fn name(&self) -> &'static str {
        "ai_reply"
    }

    fn accepts(&self, event: &Event) -> bool {
        is_supported(&event.kind)
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        let reply = self.agent.reply_for(event).await;
        if let Err(e) = self.platform.send_text(&self.account, &event.from_uid, &reply.content).await {
            warn!(error = %e, "failed to deliver agent reply");
        }
        Ok(())
    }
}
