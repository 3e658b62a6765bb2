//! Database schema.

use crate::error::StoreResult;
use rusqlite::Connection;

/// Id of the built-in product every unassigned license belongs to.
pub const DEFAULT_PRODUCT_ID: i64 = 0;

/// Name reported for the built-in product.
pub const DEFAULT_PRODUCT_NAME: &str = "Default";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS licenses (
        sn TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        expires_at TEXT,
        valid_days INTEGER NOT NULL DEFAULT 365,
        description TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 1,
        usage_count INTEGER NOT NULL DEFAULT 0,
        last_used_at TEXT,
        daily_analysis INTEGER NOT NULL DEFAULT 20,
        total_credits REAL NOT NULL DEFAULT 0,
        credits_mode INTEGER NOT NULL DEFAULT 0,
        used_credits REAL NOT NULL DEFAULT 0,
        product_id INTEGER DEFAULT 0,
        license_group_id TEXT,
        llm_group_id TEXT,
        search_group_id TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_licenses_available
        ON licenses(product_id, is_active, usage_count);

    CREATE TABLE IF NOT EXISTS bindings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        sn TEXT NOT NULL,
        origin TEXT NOT NULL DEFAULT '',
        product_id INTEGER NOT NULL DEFAULT 0,
        kind TEXT NOT NULL DEFAULT 'commercial',
        created_at TEXT NOT NULL,
        UNIQUE(email, product_id, kind)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_bindings_sn ON bindings(sn);
    CREATE INDEX IF NOT EXISTS idx_bindings_origin ON bindings(origin, created_at);

    CREATE TABLE IF NOT EXISTS license_groups (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        trust_level TEXT NOT NULL DEFAULT 'low',
        llm_group_id TEXT,
        search_group_id TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS provider_groups (
        family TEXT NOT NULL,
        id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        PRIMARY KEY(family, id)
    );

    CREATE TABLE IF NOT EXISTS provider_configs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        family TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        provider_type TEXT NOT NULL DEFAULT '',
        base_url TEXT NOT NULL DEFAULT '',
        api_key TEXT NOT NULL DEFAULT '',
        model TEXT NOT NULL DEFAULT '',
        is_active INTEGER NOT NULL DEFAULT 0,
        start_date TEXT NOT NULL DEFAULT '',
        end_date TEXT NOT NULL DEFAULT '',
        group_id TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_provider_configs_group
        ON provider_configs(family, group_id);

    CREATE TABLE IF NOT EXISTS products (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS product_extra_info (
        product_id INTEGER NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        value_type TEXT NOT NULL DEFAULT 'string',
        PRIMARY KEY(product_id, key)
    );

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS email_filters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        list TEXT NOT NULL,
        pattern TEXT NOT NULL,
        llm_group_id TEXT,
        search_group_id TEXT,
        created_at TEXT NOT NULL,
        UNIQUE(list, pattern)
    );

    CREATE TABLE IF NOT EXISTS request_limits (
        origin TEXT NOT NULL,
        day TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY(origin, day)
    );

    CREATE TABLE IF NOT EXISTS usage_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sn TEXT NOT NULL,
        used_credits REAL NOT NULL,
        reported_at TEXT NOT NULL,
        origin TEXT NOT NULL DEFAULT ''
    );

    CREATE INDEX IF NOT EXISTS idx_usage_log_sn ON usage_log(sn, id);

    CREATE TABLE IF NOT EXISTS notify_tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject TEXT NOT NULL,
        body TEXT NOT NULL,
        product_id INTEGER NOT NULL DEFAULT -1,
        total_count INTEGER NOT NULL DEFAULT 0,
        sent_count INTEGER NOT NULL DEFAULT 0,
        failed_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'running',
        created_at TEXT NOT NULL,
        completed_at TEXT
    );

    CREATE TABLE IF NOT EXISTS notify_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id INTEGER NOT NULL REFERENCES notify_tasks(id),
        email TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        error TEXT,
        sent_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_notify_items_task ON notify_items(task_id, status);
";

pub(crate) fn init(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO products (id, name, description, created_at)
         VALUES (?1, ?2, '', datetime('now'))",
        rusqlite::params![DEFAULT_PRODUCT_ID, DEFAULT_PRODUCT_NAME],
    )?;
    Ok(())
}
