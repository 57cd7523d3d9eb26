use std::sync::Arc;

use merchat_core::ids::AccountKey;
use merchat_core::{Account, CoreError, Result};
use merchat_store::CredentialStore;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{instrument, warn};

use crate::login::LoginProvider;
use crate::retry::{backoff_delay, is_retryable_status};

const USER_AGENT: &str = "merchat-platform/0.1";

pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_ms: u64,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: merchat_core::config::RETRY_MAX_ATTEMPTS_DEFAULT,
            base_ms: merchat_core::config::RETRY_BASE_MS_DEFAULT,
            factor: merchat_core::config::RETRY_FACTOR_DEFAULT,
        }
    }
}

/// Typed HTTP calls to the e-commerce platform (§4.2, §6.2).
///
/// Credential refresh is serialized per account via `refresh_locks`, so
/// concurrent callers for the same account wait for one in-flight refresh
/// instead of each starting their own.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<CredentialStore>,
    login: Arc<dyn LoginProvider>,
    retry: RetryPolicy,
    refresh_locks: dashmap::DashMap<AccountKey, Arc<AsyncMutex<()>>>,
}

impl PlatformClient {
    pub fn new(
        base_url: impl Into<String>,
        store: Arc<CredentialStore>,
        login: Arc<dyn LoginProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            store,
            login,
            retry,
            refresh_locks: dashmap::DashMap::new(),
        }
    }

    #[instrument(skip(self, account, body), fields(channel = %account.channel, shop_id = %account.shop_id, account_user_id = %account.account_user_id))]
    async fn request_json(&self, account: &Account, path: &str, body: Value) -> Result<Value> {
        let mut account = account.clone();
        let mut refreshed_once = false;

        for attempt in 0..self.retry.max_attempts {
            let cookie = account
                .credentials
                .as_ref()
                .and_then(|c| c.get("cookie"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let resp = self
                .http
                .request(Method::POST, format!("{}{}", self.base_url, path))
                .header("Cookie", cookie)
                .header("User-Agent", USER_AGENT)
                .json(&body)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(backoff_delay(attempt, self.retry.base_ms, self.retry.factor)).await;
                        continue;
                    }
                    return Err(CoreError::Transport(e.to_string()));
                }
            };

            let status = resp.status();
            if is_retryable_status(status.as_u16()) {
                if attempt + 1 < self.retry.max_attempts {
                    tokio::time::sleep(backoff_delay(attempt, self.retry.base_ms, self.retry.factor)).await;
                    continue;
                }
                return Err(CoreError::Transport(format!("http {status}")));
            }
            if status.is_client_error() {
                let text = resp.text().await.unwrap_or_default();
                return Err(CoreError::Remote { code: status.as_str().to_string(), msg: text });
            }

            let value: Value = resp.json().await.map_err(|e| CoreError::Transport(e.to_string()))?;

            if value.get("success").and_then(|v| v.as_bool()) == Some(true) {
                return Ok(value.get("result").cloned().unwrap_or(Value::Null));
            }

            if is_session_expired(&value) {
                if refreshed_once {
                    return Err(CoreError::SessionExpired);
                }
                self.refresh_account_credentials(&mut account).await?;
                refreshed_once = true;
                continue;
            }

            let msg = value
                .get("errorMsg")
                .and_then(|v| v.as_str())
                .or_else(|| value.get("result").and_then(|r| r.get("error")).and_then(|m| m.as_str()))
                .unwrap_or("unknown platform error")
                .to_string();
            return Err(CoreError::Remote { code: "platform_error".to_string(), msg });
        }

        Err(CoreError::Transport("retries exhausted".to_string()))
    }

    /// Unattached call: no account to persist a refreshed credential against,
    /// so a session-expired response is surfaced directly rather than
    /// triggering the login subsystem.
    async fn request_with_credentials(&self, credentials: &Value, path: &str, body: Value) -> Result<Value> {
        let cookie = credentials.get("cookie").and_then(|v| v.as_str()).unwrap_or("").to_string();

        for attempt in 0..self.retry.max_attempts {
            let resp = self
                .http
                .post(format!("{}{}", self.base_url, path))
                .header("Cookie", &cookie)
                .header("User-Agent", USER_AGENT)
                .json(&body)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(e) => {
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(backoff_delay(attempt, self.retry.base_ms, self.retry.factor)).await;
                        continue;
                    }
                    return Err(CoreError::Transport(e.to_string()));
                }
            };

            let status = resp.status();
            if is_retryable_status(status.as_u16()) {
                if attempt + 1 < self.retry.max_attempts {
                    tokio::time::sleep(backoff_delay(attempt, self.retry.base_ms, self.retry.factor)).await;
                    continue;
                }
                return Err(CoreError::Transport(format!("http {status}")));
            }
            if status.is_client_error() {
                return Err(CoreError::Remote { code: status.as_str().to_string(), msg: resp.text().await.unwrap_or_default() });
            }

            let value: Value = resp.json().await.map_err(|e| CoreError::Transport(e.to_string()))?;
            if value.get("success").and_then(|v| v.as_bool()) == Some(true) {
                return Ok(value.get("result").cloned().unwrap_or(Value::Null));
            }
            if is_session_expired(&value) {
                return Err(CoreError::SessionExpired);
            }
            let msg = value.get("errorMsg").and_then(|v| v.as_str()).unwrap_or("unknown platform error").to_string();
            return Err(CoreError::Remote { code: "platform_error".to_string(), msg });
        }

        Err(CoreError::Transport("retries exhausted".to_string()))
    }

    async fn refresh_account_credentials(&self, account: &mut Account) -> Result<()> {
        let key = AccountKey {
            channel: account.channel.clone(),
            shop_id: account.shop_id.clone(),
            account_user_id: account.account_user_id.clone(),
        };
        let lock = self
            .refresh_locks
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have already refreshed while we waited on the lock.
        if let Ok(Some(fresh)) = self.store.get_account(&account.channel, &account.shop_id, &account.account_user_id) {
            if fresh.credentials != account.credentials {
                account.credentials = fresh.credentials;
                return Ok(());
            }
        }

        let new_credentials = match account.profile_dir.as_deref() {
            Some(profile_dir) => match self.login.refresh(profile_dir).await {
                Ok(creds) => creds,
                Err(e) => {
                    warn!(error = %e, "silent refresh failed, falling back to full login");
                    self.login
                        .login(&account.username, &account.password)
                        .await
                        .map_err(|e| {
                            warn!(error = %e, "full login failed, session cannot be refreshed");
                            CoreError::SessionExpired
                        })?
                        .credentials
                }
            },
            None => self
                .login
                .login(&account.username, &account.password)
                .await
                .map_err(|e| {
                    warn!(error = %e, "login failed, session cannot be refreshed");
                    CoreError::SessionExpired
                })?
                .credentials,
        };

        self.store
            .update_credentials(&account.channel, &account.shop_id, &account.account_user_id, new_credentials.clone())
            .map_err(|e| CoreError::Storage(e.to_string()))?;
        account.credentials = Some(new_credentials);
        Ok(())
    }

    pub async fn fetch_chat_token(&self, account: &Account) -> Result<String> {
        let result = self.request_json(account, "/chats/getToken", json!({ "version": "3" })).await?;
        result
            .get("token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| CoreError::Remote { code: "missing_token".into(), msg: "no token in response".into() })
    }

    pub async fn send_text(&self, account: &Account, to_uid: &str, text: &str) -> Result<()> {
        let body = json!({
            "data": {
                "cmd": "send_message",
                "request_id": chrono::Utc::now().timestamp_millis(),
                "message": {
                    "to": { "role": "user", "uid": to_uid },
                    "from": { "role": "mall_cs" },
                    "content": text,
                    "type": 0,
                    "msg_id": Value::Null,
                    "is_aut": 0,
                    "manual_reply": 1,
                }
            },
            "client": "WEB",
        });
        self.request_json(account, "/plateau/chat/send_message", body).await?;
        Ok(())
    }

    pub async fn send_image(&self, account: &Account, to_uid: &str, url: &str) -> Result<()> {
        let body = json!({
            "data": {
                "cmd": "send_message",
                "request_id": chrono::Utc::now().timestamp_millis(),
                "message": {
                    "to": { "role": "user", "uid": to_uid },
                    "from": { "role": "mall_cs" },
                    "content": url,
                    "type": 1,
                    "msg_id": Value::Null,
                    "is_aut": 0,
                    "manual_reply": 1,
                }
            },
            "client": "WEB",
        });
        self.request_json(account, "/plateau/chat/send_message", body).await?;
        Ok(())
    }

    pub async fn send_goods_card(&self, account: &Account, to_uid: &str, goods_id: &str) -> Result<()> {
        let body = json!({ "uid": to_uid, "goods_id": goods_id, "biz_type": 3 });
        self.request_json(account, "/plateau/message/send/mallGoodsCard", body).await?;
        Ok(())
    }

    pub async fn set_presence(&self, credentials: &Value, presence_code: u8) -> Result<()> {
        let body = json!({ "data": { "cmd": "set_csstatus", "status": presence_code }, "client": "WEB" });
        self.request_with_credentials(credentials, "/plateau/chat/set_csstatus", body).await?;
        Ok(())
    }

    pub async fn assign_cs_list(&self, account: &Account) -> Result<Value> {
        self.request_json(account, "/latitude/assign/getAssignCsList", json!({ "wechatCheck": true })).await
    }

    pub async fn transfer_conversation(&self, account: &Account, to_uid: &str, cs_uid: &str) -> Result<()> {
        let body = json!({
            "data": {
                "cmd": "move_conversation",
                "request_id": chrono::Utc::now().timestamp_millis(),
                "conversation": { "csid": cs_uid, "uid": to_uid, "need_wx": false, "remark": Value::Null },
            },
            "client": "WEB",
        });
        self.request_json(account, "/plateau/chat/move_conversation", body).await?;
        Ok(())
    }

    pub async fn fetch_user_info(&self, credentials: &Value) -> Result<Value> {
        self.request_with_credentials(credentials, "/janus/api/new/userinfo", json!({})).await
    }

    pub async fn fetch_shop_info(&self, credentials: &Value) -> Result<Value> {
        self.request_with_credentials(credentials, "/earth/api/merchant/queryMerchantInfoByMallId", json!({})).await
    }
}

fn is_session_expired(value: &Value) -> bool {
    let code = value
        .get("result")
        .and_then(|r| r.get("error_code"))
        .and_then(|c| c.as_i64())
        .or_else(|| value.get("error_code").and_then(|c| c.as_i64()));
    let msg = value
        .get("result")
        .and_then(|r| r.get("error"))
        .and_then(|m| m.as_str())
        .or_else(|| value.get("errorMsg").and_then(|m| m.as_str()))
        .unwrap_or("");
    code == Some(43001) && msg.contains("会话已过期")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_session_expired_via_result_wrapper() {
        let v = json!({ "result": { "error_code": 43001, "error": "会话已过期，请重新登录" } });
        assert!(is_session_expired(&v));
    }

    #[test]
    fn detects_session_expired_via_top_level() {
        let v = json!({ "success": false, "error_code": 43001, "errorMsg": "会话已过期" });
        assert!(is_session_expired(&v));
    }

    #[test]
    fn other_errors_are_not_session_expired() {
        let v = json!({ "success": false, "errorMsg": "参数错误" });
        assert!(!is_session_expired(&v));
    }
}
