use std::time::Duration;

use merchat_core::config::MerchatConfig;

/// Supervisor-relevant slice of `MerchatConfig` (§4.10, §4.12), flattened so
/// `Supervisor::new` does not need to reach back into the full config tree
/// on every session start.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub business_start: String,
    pub business_end: String,
    pub queue_max_size: usize,
    pub max_concurrent: usize,
    pub dispatcher_idle: Duration,
    pub reaper_interval: Duration,
    pub ping_seconds: u64,
    pub pong_timeout_seconds: u64,
    pub ws_base_url: String,
    pub client_version: String,
    pub stop_join_timeout: Duration,
}

impl SupervisorConfig {
    pub fn from_config(cfg: &MerchatConfig) -> Self {
        Self {
            business_start: cfg.business.start.clone(),
            business_end: cfg.business.end.clone(),
            queue_max_size: cfg.queue.max_size,
            max_concurrent: cfg.consumer.max_concurrent,
            dispatcher_idle: Duration::from_secs(cfg.dispatcher.idle_seconds),
            reaper_interval: Duration::from_secs(merchat_core::config::REAPER_INTERVAL_SECS),
            ping_seconds: cfg.transport.ping_seconds,
            pong_timeout_seconds: cfg.transport.pong_timeout_seconds,
            ws_base_url: cfg.platform.ws_base_url.clone(),
            client_version: cfg.platform.client_version.clone(),
            stop_join_timeout: Duration::from_secs(merchat_core::config::STOP_JOIN_TIMEOUT_SECS),
        }
    }
}
