use async_trait::async_trait;

use crate::error::Result;
use crate::types::Event;

/// One link in the handler chain (§4.8). The chain is ordered; the first
/// handler whose `accepts` returns true owns the event and no later handler
/// runs. Handlers hold their own dependencies (platform client, agent
/// adapter, keyword list) as constructor-injected fields — no shared mutable
/// state between handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, event: &Event) -> bool;

    async fn handle(&self, event: &Event) -> Result<()>;
}
