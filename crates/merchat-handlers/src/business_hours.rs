use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use merchat_core::{Account, Event, Handler, Result};
use merchat_platform::PlatformClient;
use tracing::warn;

const OFF_HOURS_TEXT: &str = "当前为非营业时间，客服将在营业时间内尽快回复您";

/// Accepts every event iff the local clock falls outside `[start, end]`
/// (§4.8, first in chain). Boundaries are inclusive.
pub struct BusinessHoursHandler {
    start: NaiveTime,
    end: NaiveTime,
    platform: std::sync::Arc<PlatformClient>,
    account: Account,
}

impl BusinessHoursHandler {
    pub fn new(start: &str, end: &str, platform: std::sync::Arc<PlatformClient>, account: Account) -> Self {
        let start = NaiveTime::parse_from_str(start, "%H:%M").unwrap_or(NaiveTime::MIN);
        let end = NaiveTime::parse_from_str(end, "%H:%M").unwrap_or(NaiveTime::MIN);
        Self { start, end, platform, account }
    }
}

#[async_trait]
impl Handler for BusinessHoursHandler {
    fn name(&self) -> &'static str {
        "business_hours"
    }

    fn accepts(&self, _event: &Event) -> bool {
        let now = Local::now().time();
        !(now >= self.start && now <= self.end)
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        if let Err(e) = self.platform.send_text(&self.account, &event.from_uid, OFF_HOURS_TEXT).await {
            warn!(error = %e, "failed to send off-hours reply");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_outside_window() {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert!(!(noon < start || noon > end));
    }
}
