//! Settings, email filter lists and per-origin request counters.

use crate::error::StoreResult;
use crate::licenses::non_empty;
use crate::pool::Store;
use crate::time::format_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::fmt;

/// Which list an email pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterList {
    Blacklist,
    Whitelist,
    /// Conditional routing to provider groups.
    Condition,
}

impl FilterList {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blacklist => "blacklist",
            Self::Whitelist => "whitelist",
            Self::Condition => "condition",
        }
    }
}

impl fmt::Display for FilterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A full address or an `@domain` suffix, stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailFilter {
    pub id: i64,
    pub list: FilterList,
    pub pattern: String,
    pub llm_group_id: Option<String>,
    pub search_group_id: Option<String>,
}

impl Store {
    // ── Settings ─────────────────────────────────────────────────

    pub fn setting(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    // ── Email filters ────────────────────────────────────────────

    /// Adds a pattern to a list. Re-adding updates its routing groups.
    pub fn add_email_filter(
        &self,
        list: FilterList,
        pattern: &str,
        llm_group_id: Option<&str>,
        search_group_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO email_filters (list, pattern, llm_group_id, search_group_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(list, pattern) DO UPDATE SET
                llm_group_id = excluded.llm_group_id,
                search_group_id = excluded.search_group_id",
            params![
                list.as_str(),
                pattern.trim().to_lowercase(),
                non_empty(llm_group_id.map(str::to_string)),
                non_empty(search_group_id.map(str::to_string)),
                format_timestamp(now),
            ],
        )?;
        Ok(())
    }

    pub fn remove_email_filter(&self, list: FilterList, pattern: &str) -> StoreResult<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM email_filters WHERE list = ?1 AND pattern = ?2",
            params![list.as_str(), pattern.trim().to_lowercase()],
        )?;
        Ok(n > 0)
    }

    /// Patterns of one list in insertion order.
    pub fn email_filters(&self, list: FilterList) -> StoreResult<Vec<EmailFilter>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, pattern, llm_group_id, search_group_id
             FROM email_filters WHERE list = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![list.as_str()], |row| {
                Ok(EmailFilter {
                    id: row.get(0)?,
                    list,
                    pattern: row.get(1)?,
                    llm_group_id: non_empty(row.get(2)?),
                    search_group_id: non_empty(row.get(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Request counters ─────────────────────────────────────────

    /// Requests counted for `origin` on `day` (`YYYY-MM-DD`).
    pub fn request_count(&self, origin: &str, day: &str) -> StoreResult<i64> {
        let conn = self.conn();
        let count = conn
            .query_row(
                "SELECT count FROM request_limits WHERE origin = ?1 AND day = ?2",
                params![origin, day],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// Adds one request for `origin` on `day`, returning the new count.
    pub fn increment_request_count(&self, origin: &str, day: &str) -> StoreResult<i64> {
        let conn = self.conn();
        Ok(conn.query_row(
            "INSERT INTO request_limits (origin, day, count) VALUES (?1, ?2, 1)
             ON CONFLICT(origin, day) DO UPDATE SET count = count + 1
             RETURNING count",
            params![origin, day],
            |row| row.get(0),
        )?)
    }
}
