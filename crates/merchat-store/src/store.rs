use std::str::FromStr;
use std::sync::Mutex;

use merchat_core::ids::{AccountUserId, ConversationId, ShopId};
use merchat_core::{Account, Conversation, Keyword, Presence, Shop};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use crate::db::{init_db, seed_default_keywords};
use crate::error::{Result, StoreError};

/// Single source of truth for accounts, shops, conversations, and keywords.
/// No in-memory caching of any field — every `get_*` issues a fresh query,
/// so `credentials`/`presence` can never be observed stale across restarts.
pub struct CredentialStore {
    conn: Mutex<Connection>,
}

impl CredentialStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn seed_default_keywords(&self, channel: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        seed_default_keywords(&conn, channel)
    }

    #[instrument(skip(self, password, credentials), fields(channel, %shop_id, %account_user_id))]
    pub fn add_account(
        &self,
        channel: &str,
        shop_id: &ShopId,
        account_user_id: &AccountUserId,
        username: &str,
        password: &str,
        credentials: Option<serde_json::Value>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let creds = credentials.map(|c| c.to_string());
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO accounts
                 (channel, shop_id, account_user_id, username, password, profile_dir,
                  credentials, presence, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 'unverified', ?7, ?7)",
                params![channel, shop_id.as_str(), account_user_id.as_str(), username, password, creds, now],
            )?;
        if changed == 0 {
            return Err(StoreError::Duplicate);
        }
        seed_default_keywords(&conn, channel)?;
        Ok(())
    }

    #[instrument(skip(self), fields(channel, %shop_id, %account_user_id))]
    pub fn get_account(
        &self,
        channel: &str,
        shop_id: &ShopId,
        account_user_id: &AccountUserId,
    ) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT channel, shop_id, account_user_id, username, password, profile_dir,
                        credentials, presence, created_at, updated_at
                 FROM accounts WHERE channel = ?1 AND shop_id = ?2 AND account_user_id = ?3",
                params![channel, shop_id.as_str(), account_user_id.as_str()],
                row_to_account,
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_accounts(&self, shop_id: Option<&ShopId>) -> Result<Vec<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT channel, shop_id, account_user_id, username, password, profile_dir,
                    credentials, presence, created_at, updated_at
             FROM accounts WHERE (?1 IS NULL OR shop_id = ?1)",
        )?;
        let rows = stmt.query_map(params![shop_id.map(|s| s.as_str())], row_to_account)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    #[instrument(skip(self, credentials), fields(channel, %shop_id, %account_user_id))]
    pub fn update_credentials(
        &self,
        channel: &str,
        shop_id: &ShopId,
        account_user_id: &AccountUserId,
        credentials: serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE accounts SET credentials = ?1, updated_at = ?2
             WHERE channel = ?3 AND shop_id = ?4 AND account_user_id = ?5",
            params![credentials.to_string(), now, channel, shop_id.as_str(), account_user_id.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(channel, %shop_id, %account_user_id, %presence))]
    pub fn update_presence(
        &self,
        channel: &str,
        shop_id: &ShopId,
        account_user_id: &AccountUserId,
        presence: Presence,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE accounts SET presence = ?1, updated_at = ?2
             WHERE channel = ?3 AND shop_id = ?4 AND account_user_id = ?5",
            params![presence.to_string(), now, channel, shop_id.as_str(), account_user_id.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn update_profile(
        &self,
        channel: &str,
        shop_id: &ShopId,
        account_user_id: &AccountUserId,
        profile_dir: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE accounts SET profile_dir = ?1, updated_at = ?2
             WHERE channel = ?3 AND shop_id = ?4 AND account_user_id = ?5",
            params![profile_dir, now, channel, shop_id.as_str(), account_user_id.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn delete_account(
        &self,
        channel: &str,
        shop_id: &ShopId,
        account_user_id: &AccountUserId,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM accounts WHERE channel = ?1 AND shop_id = ?2 AND account_user_id = ?3",
            params![channel, shop_id.as_str(), account_user_id.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        let remaining: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE channel = ?1 AND shop_id = ?2",
            params![channel, shop_id.as_str()],
            |r| r.get(0),
        )?;
        if remaining == 0 {
            conn.execute(
                "DELETE FROM shops WHERE channel = ?1 AND shop_id = ?2",
                params![channel, shop_id.as_str()],
            )?;
        }
        Ok(())
    }

    pub fn upsert_shop(&self, channel: &str, shop_id: &ShopId, name: &str, logo: Option<&str>, description: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO shops (channel, shop_id, name, logo, description)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(channel, shop_id) DO UPDATE SET name = excluded.name,
                logo = excluded.logo, description = excluded.description",
            params![channel, shop_id.as_str(), name, logo, description],
        )?;
        Ok(())
    }

    pub fn get_shop(&self, channel: &str, shop_id: &ShopId) -> Result<Option<Shop>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT channel, shop_id, name, logo, description FROM shops
                 WHERE channel = ?1 AND shop_id = ?2",
                params![channel, shop_id.as_str()],
                |row| {
                    Ok(Shop {
                        channel: row.get(0)?,
                        shop_id: ShopId::new(row.get::<_, String>(1)?),
                        name: row.get(2)?,
                        logo: row.get(3)?,
                        description: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn get_conversation(&self, user_key: &str) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_key, conversation_id, created_at FROM conversations WHERE user_key = ?1",
                params![user_key],
                |row| {
                    Ok(Conversation {
                        user_key: row.get(0)?,
                        conversation_id: ConversationId::new(row.get::<_, String>(1)?),
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Lazily attaches a conversation id the first time an AI interaction
    /// happens for this user_key; never overwrites an existing mapping
    /// (§3 invariant: at most one conversation id per user_key).
    pub fn set_conversation(&self, user_key: &str, conversation_id: &ConversationId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO conversations (user_key, conversation_id, created_at)
             VALUES (?1, ?2, ?3)",
            params![user_key, conversation_id.as_str(), now],
        )?;
        Ok(())
    }

    pub fn list_keywords(&self, channel: &str) -> Result<Vec<Keyword>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT channel, keyword, created_at FROM keywords WHERE channel = ?1",
        )?;
        let rows = stmt.query_map(params![channel], |row| {
            Ok(Keyword {
                channel: row.get(0)?,
                keyword: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn add_keyword(&self, channel: &str, keyword: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT OR IGNORE INTO keywords (channel, keyword, created_at) VALUES (?1, ?2, ?3)",
            params![channel, keyword, now],
        )?;
        Ok(())
    }

    pub fn remove_keyword(&self, channel: &str, keyword: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM keywords WHERE channel = ?1 AND keyword = ?2",
            params![channel, keyword],
        )?;
        Ok(())
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let creds_str: Option<String> = row.get(6)?;
    let presence_str: String = row.get(7)?;
    Ok(Account {
        channel: row.get(0)?,
        shop_id: ShopId::new(row.get::<_, String>(1)?),
        account_user_id: AccountUserId::new(row.get::<_, String>(2)?),
        username: row.get(3)?,
        password: row.get(4)?,
        profile_dir: row.get(5)?,
        credentials: creds_str.and_then(|s| serde_json::from_str(&s).ok()),
        presence: Presence::from_str(&presence_str).unwrap_or(Presence::Unverified),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        CredentialStore::in_memory().unwrap()
    }

    #[test]
    fn add_then_get_account() {
        let s = store();
        let shop = ShopId::new("shop1");
        let acc = AccountUserId::new("acc1");
        s.add_account("pinduoduo", &shop, &acc, "user", "pass", None).unwrap();
        let got = s.get_account("pinduoduo", &shop, &acc).unwrap().unwrap();
        assert_eq!(got.username, "user");
        assert_eq!(got.presence, Presence::Unverified);
    }

    #[test]
    fn duplicate_add_fails() {
        let s = store();
        let shop = ShopId::new("shop1");
        let acc = AccountUserId::new("acc1");
        s.add_account("pinduoduo", &shop, &acc, "user", "pass", None).unwrap();
        let err = s.add_account("pinduoduo", &shop, &acc, "user2", "pass2", None).unwrap_err();
        assert_eq!(err.code(), "DUPLICATE");
    }

    #[test]
    fn update_presence_roundtrip() {
        let s = store();
        let shop = ShopId::new("shop1");
        let acc = AccountUserId::new("acc1");
        s.add_account("pinduoduo", &shop, &acc, "user", "pass", None).unwrap();
        s.update_presence("pinduoduo", &shop, &acc, Presence::Online).unwrap();
        let got = s.get_account("pinduoduo", &shop, &acc).unwrap().unwrap();
        assert_eq!(got.presence, Presence::Online);
    }

    #[test]
    fn update_presence_missing_account_not_found() {
        let s = store();
        let shop = ShopId::new("shop1");
        let acc = AccountUserId::new("nope");
        let err = s.update_presence("pinduoduo", &shop, &acc, Presence::Online).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn conversation_set_once_then_immutable() {
        let s = store();
        let cid1 = ConversationId::new("c1");
        let cid2 = ConversationId::new("c2");
        s.set_conversation("shop1:U1", &cid1).unwrap();
        s.set_conversation("shop1:U1", &cid2).unwrap();
        let got = s.get_conversation("shop1:U1").unwrap().unwrap();
        assert_eq!(got.conversation_id.as_str(), "c1");
    }

    #[test]
    fn seed_and_list_keywords() {
        let s = store();
        s.seed_default_keywords("pinduoduo").unwrap();
        let kws = s.list_keywords("pinduoduo").unwrap();
        assert!(kws.iter().any(|k| k.keyword == "转人工"));
    }

    #[test]
    fn delete_account_cascades_shop_when_last() {
        let s = store();
        let shop = ShopId::new("shop1");
        let acc = AccountUserId::new("acc1");
        s.add_account("pinduoduo", &shop, &acc, "user", "pass", None).unwrap();
        s.upsert_shop("pinduoduo", &shop, "My Shop", None, None).unwrap();
        s.delete_account("pinduoduo", &shop, &acc).unwrap();
        assert!(s.get_shop("pinduoduo", &shop).unwrap().is_none());
    }
}
