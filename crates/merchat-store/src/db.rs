use rusqlite::Connection;

use crate::error::Result;

/// Idempotent schema setup, run once on every startup (teacher convention:
/// `CREATE TABLE IF NOT EXISTS`, never a migration framework for a schema
/// this small).
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            channel          TEXT NOT NULL,
            shop_id          TEXT NOT NULL,
            account_user_id  TEXT NOT NULL,
            username         TEXT NOT NULL,
            password         TEXT NOT NULL,
            profile_dir      TEXT,
            credentials      TEXT,
            presence         TEXT NOT NULL DEFAULT 'unverified',
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL,
            PRIMARY KEY (channel, shop_id, account_user_id)
        );

        CREATE TABLE IF NOT EXISTS shops (
            channel      TEXT NOT NULL,
            shop_id      TEXT NOT NULL,
            name         TEXT NOT NULL,
            logo         TEXT,
            description  TEXT,
            PRIMARY KEY (channel, shop_id)
        );

        CREATE TABLE IF NOT EXISTS conversations (
            user_key         TEXT PRIMARY KEY,
            conversation_id  TEXT NOT NULL,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS keywords (
            channel     TEXT NOT NULL,
            keyword     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (channel, keyword)
        );

        CREATE INDEX IF NOT EXISTS idx_accounts_shop ON accounts(shop_id);
        ",
    )?;
    Ok(())
}

/// Seed the default transfer-to-human keyword set on first run, mirroring
/// the fixed keyword list §4.8 describes, now backed by the `keywords` table.
pub fn seed_default_keywords(conn: &Connection, channel: &str) -> Result<()> {
    const DEFAULTS: &[&str] = &["转人工", "人工客服", "投诉", "转接人工", "找人工"];
    let now = chrono::Utc::now().to_rfc3339();
    for kw in DEFAULTS {
        conn.execute(
            "INSERT OR IGNORE INTO keywords (channel, keyword, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![channel, kw, now],
        )?;
    }
    Ok(())
}
