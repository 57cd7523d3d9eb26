use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const QUEUE_MAX_DEFAULT: usize = 1000;
pub const MAX_CONCURRENT_DEFAULT: usize = 10;
pub const DISPATCHER_IDLE_SECS_DEFAULT: u64 = 30;
pub const REAPER_INTERVAL_SECS: u64 = 60;
pub const RETRY_MAX_ATTEMPTS_DEFAULT: u32 = 3;
pub const RETRY_BASE_MS_DEFAULT: u64 = 1000;
pub const RETRY_FACTOR_DEFAULT: f64 = 2.0;
pub const PING_SECONDS_DEFAULT: u64 = 20;
pub const PONG_TIMEOUT_SECONDS_DEFAULT: u64 = 20;
pub const STOP_JOIN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchatConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub business: BusinessConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub bot_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            bot_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    #[serde(default = "default_business_start")]
    pub start: String,
    #[serde(default = "default_business_end")]
    pub end: String,
}

fn default_business_start() -> String {
    "08:00".to_string()
}

fn default_business_end() -> String {
    "23:00".to_string()
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            start: default_business_start(),
            end: default_business_end(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,
}

fn default_queue_max_size() -> usize {
    QUEUE_MAX_DEFAULT
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_queue_max_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    MAX_CONCURRENT_DEFAULT
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_idle_seconds")]
    pub idle_seconds: u64,
}

fn default_idle_seconds() -> u64 {
    DISPATCHER_IDLE_SECS_DEFAULT
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            idle_seconds: default_idle_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub factor: f64,
}

fn default_retry_max_attempts() -> u32 {
    RETRY_MAX_ATTEMPTS_DEFAULT
}

fn default_retry_base_ms() -> u64 {
    RETRY_BASE_MS_DEFAULT
}

fn default_retry_factor() -> f64 {
    RETRY_FACTOR_DEFAULT
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_ms: default_retry_base_ms(),
            factor: default_retry_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_ping_seconds")]
    pub ping_seconds: u64,
    #[serde(default = "default_pong_timeout_seconds")]
    pub pong_timeout_seconds: u64,
}

fn default_ping_seconds() -> u64 {
    PING_SECONDS_DEFAULT
}

fn default_pong_timeout_seconds() -> u64 {
    PONG_TIMEOUT_SECONDS_DEFAULT
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ping_seconds: default_ping_seconds(),
            pong_timeout_seconds: default_pong_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_http_base_url")]
    pub http_base_url: String,
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

fn default_http_base_url() -> String {
    String::new()
}

fn default_ws_base_url() -> String {
    String::new()
}

fn default_client_version() -> String {
    "1".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            http_base_url: default_http_base_url(),
            ws_base_url: default_ws_base_url(),
            client_version: default_client_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "merchat.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_bind")]
    pub bind: String,
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

fn default_admin_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    8088
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind: default_admin_bind(),
            port: default_admin_port(),
        }
    }
}

impl Default for MerchatConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            business: BusinessConfig::default(),
            queue: QueueConfig::default(),
            consumer: ConsumerConfig::default(),
            dispatcher: DispatcherConfig::default(),
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            platform: PlatformConfig::default(),
            database: DatabaseConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl MerchatConfig {
    /// Load layered config: explicit path > MERCHAT_CONFIG env > ./merchat.toml,
    /// merged over coded defaults, then overridden by MERCHAT_-prefixed env vars.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(|s| s.to_string())
            .or_else(|| std::env::var("MERCHAT_CONFIG").ok())
            .unwrap_or_else(|| "merchat.toml".to_string());

        let figment = Figment::from(Serialized::defaults(MerchatConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MERCHAT_").split("_"));

        let config: MerchatConfig = figment
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.agent.endpoint.is_empty() {
            return Err(CoreError::Config("agent.endpoint is required".into()));
        }
        if self.agent.bot_id.is_empty() {
            return Err(CoreError::Config("agent.bot_id is required".into()));
        }
        if self.platform.http_base_url.is_empty() {
            return Err(CoreError::Config("platform.http_base_url is required".into()));
        }
        if self.platform.ws_base_url.is_empty() {
            return Err(CoreError::Config("platform.ws_base_url is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_fails_validation_without_agent_endpoint() {
        let cfg = MerchatConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = MerchatConfig::default();
        assert_eq!(cfg.queue.max_size, 1000);
        assert_eq!(cfg.consumer.max_concurrent, 10);
        assert_eq!(cfg.dispatcher.idle_seconds, 30);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.base_ms, 1000);
        assert_eq!(cfg.transport.ping_seconds, 20);
    }
}
