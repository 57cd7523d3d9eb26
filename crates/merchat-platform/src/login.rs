use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque credential bundle handed back by a login or refresh. Stored
/// verbatim by the caller via the credential store (§4.1); never inspected
/// here beyond round-tripping through JSON.
pub type Credentials = serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopInfo {
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub mall_id: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub credentials: Credentials,
    pub shop: ShopInfo,
    pub user: UserInfo,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("login failed: {0}")]
    Failed(String),
}

/// The browser-automation login subsystem, modeled as a trait so the real
/// implementation never needs to touch the platform client (§6.3).
///
/// Implementations may block for tens of seconds. Callers are responsible
/// for serializing the two calls for a single account; this trait makes no
/// internal locking guarantee.
#[async_trait]
pub trait LoginProvider: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, LoginError>;

    /// Silent refresh using a persisted profile directory; no password
    /// prompt. Fails if the profile's session is no longer valid.
    async fn refresh(&self, profile_dir: &str) -> Result<Credentials, LoginError>;
}

/// Deterministic fixture used by tests and by deployments that have not
/// wired a real browser-automation backend yet.
pub struct FixtureLoginProvider;

#[async_trait]
impl LoginProvider for FixtureLoginProvider {
    async fn login(&self, username: &str, _password: &str) -> Result<LoginResult, LoginError> {
        Ok(LoginResult {
            credentials: serde_json::json!({ "cookie": format!("fixture-session-for-{username}") }),
            shop: ShopInfo { id: "fixture-shop".into(), name: "Fixture Shop".into(), logo: None },
            user: UserInfo { id: username.to_string(), name: username.to_string(), mall_id: "fixture-mall".into() },
        })
    }

    async fn refresh(&self, profile_dir: &str) -> Result<Credentials, LoginError> {
        Ok(serde_json::json!({ "cookie": format!("fixture-refreshed-from-{profile_dir}") }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_login_roundtrip() {
        let provider = FixtureLoginProvider;
        let result = provider.login("alice", "secret").await.unwrap();
        assert_eq!(result.user.id, "alice");
    }
}
