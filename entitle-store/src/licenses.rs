//! License inventory.

use crate::error::StoreResult;
use crate::pool::Store;
use crate::time::{format_timestamp, opt_timestamp_column, timestamp_column};
use chrono::{DateTime, Utc};
use entitle_types::Sn;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;
use tracing::info;

/// Default validity applied when a license is first bound.
pub const DEFAULT_VALID_DAYS: i64 = 365;

/// Default daily analysis ceiling.
pub const DEFAULT_DAILY_ANALYSIS: i64 = 20;

/// A stored license.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct License {
    pub sn: Sn,
    pub created_at: DateTime<Utc>,
    /// `None` until the license is first bound (unless preset).
    pub expires_at: Option<DateTime<Utc>>,
    pub valid_days: i64,
    pub description: String,
    pub is_active: bool,
    /// Number of successful activations.
    pub usage_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub daily_analysis: i64,
    pub total_credits: f64,
    /// `true` selects metered credits, `false` the daily ceiling.
    pub credits_mode: bool,
    /// Server-side cumulative consumption, never decreases.
    pub used_credits: f64,
    pub product_id: i64,
    pub license_group_id: Option<String>,
    pub llm_group_id: Option<String>,
    pub search_group_id: Option<String>,
}

impl License {
    /// Returns true if the license is past its expiry at `now`.
    /// A license with no expiry has never been bound and counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| now > exp)
    }
}

/// Fields for creating a license.
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub sn: Sn,
    pub valid_days: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: String,
    pub daily_analysis: i64,
    pub total_credits: f64,
    pub credits_mode: bool,
    pub product_id: i64,
    pub license_group_id: Option<String>,
    pub llm_group_id: Option<String>,
    pub search_group_id: Option<String>,
}

impl NewLicense {
    /// An unbound daily-quota license for the default product.
    #[must_use]
    pub fn new(sn: Sn) -> Self {
        Self {
            sn,
            valid_days: DEFAULT_VALID_DAYS,
            expires_at: None,
            description: String::new(),
            daily_analysis: DEFAULT_DAILY_ANALYSIS,
            total_credits: 0.0,
            credits_mode: false,
            product_id: 0,
            license_group_id: None,
            llm_group_id: None,
            search_group_id: None,
        }
    }
}

pub(crate) const LICENSE_COLUMNS: &str = "sn, created_at, expires_at, valid_days, description, \
     is_active, usage_count, last_used_at, daily_analysis, total_credits, credits_mode, \
     used_credits, COALESCE(product_id, 0), license_group_id, llm_group_id, search_group_id";

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn license_from_row(row: &Row<'_>) -> rusqlite::Result<License> {
    Ok(License {
        sn: Sn::from_stored(row.get::<_, String>(0)?),
        created_at: timestamp_column(row, 1)?,
        expires_at: opt_timestamp_column(row, 2)?,
        valid_days: row.get(3)?,
        description: row.get(4)?,
        is_active: row.get(5)?,
        usage_count: row.get(6)?,
        last_used_at: opt_timestamp_column(row, 7)?,
        daily_analysis: row.get(8)?,
        total_credits: row.get(9)?,
        credits_mode: row.get(10)?,
        used_credits: row.get(11)?,
        product_id: row.get(12)?,
        license_group_id: non_empty(row.get(13)?),
        llm_group_id: non_empty(row.get(14)?),
        search_group_id: non_empty(row.get(15)?),
    })
}

pub(crate) fn insert_license_row(
    conn: &Connection,
    license: &NewLicense,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO licenses (sn, created_at, expires_at, valid_days, description,
             daily_analysis, total_credits, credits_mode, product_id,
             license_group_id, llm_group_id, search_group_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            license.sn.as_str(),
            format_timestamp(now),
            license.expires_at.map(format_timestamp),
            license.valid_days,
            license.description,
            license.daily_analysis,
            license.total_credits,
            license.credits_mode,
            license.product_id,
            non_empty(license.license_group_id.clone()),
            non_empty(license.llm_group_id.clone()),
            non_empty(license.search_group_id.clone()),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_license_row(conn: &Connection, sn: &Sn) -> StoreResult<Option<License>> {
    let sql = format!("SELECT {LICENSE_COLUMNS} FROM licenses WHERE sn = ?1");
    Ok(conn
        .query_row(&sql, params![sn.as_str()], license_from_row)
        .optional()?)
}

impl Store {
    // ── Inventory ────────────────────────────────────────────────

    /// Inserts a single license.
    pub fn insert_license(&self, license: &NewLicense, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn();
        insert_license_row(&conn, license, now)
    }

    /// Inserts a batch of licenses atomically. Rows share one creation time;
    /// insertion order breaks the tie when the matcher orders them.
    pub fn insert_licenses(&self, licenses: &[NewLicense], now: DateTime<Utc>) -> StoreResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for license in licenses {
            insert_license_row(&tx, license, now)?;
        }
        tx.commit()?;
        info!(count = licenses.len(), "licenses created");
        Ok(licenses.len())
    }

    /// Loads a license by its normalized SN.
    pub fn get_license(&self, sn: &Sn) -> StoreResult<Option<License>> {
        let conn = self.conn();
        get_license_row(&conn, sn)
    }

    /// Lists licenses for a product, newest first.
    pub fn list_licenses(&self, product_id: i64, limit: usize) -> StoreResult<Vec<License>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {LICENSE_COLUMNS} FROM licenses WHERE COALESCE(product_id, 0) = ?1
             ORDER BY datetime(created_at) DESC, rowid DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![product_id, limit as i64], license_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Counts one successful activation.
    pub fn record_activation(&self, sn: &Sn, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE licenses SET usage_count = usage_count + 1, last_used_at = ?1 WHERE sn = ?2",
            params![format_timestamp(now), sn.as_str()],
        )?;
        Ok(())
    }

    /// Enables or disables a license. Returns false if it does not exist.
    pub fn set_license_active(&self, sn: &Sn, active: bool) -> StoreResult<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE licenses SET is_active = ?1 WHERE sn = ?2",
            params![active, sn.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Overwrites the expiry. Returns false if the license does not exist.
    pub fn set_license_expiry(&self, sn: &Sn, expires_at: Option<DateTime<Utc>>) -> StoreResult<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE licenses SET expires_at = ?1 WHERE sn = ?2",
            params![expires_at.map(format_timestamp), sn.as_str()],
        )?;
        Ok(n > 0)
    }

    /// Deletes a license together with its bindings.
    pub fn force_delete_license(&self, sn: &Sn) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM bindings WHERE sn = ?1", params![sn.as_str()])?;
        let n = tx.execute("DELETE FROM licenses WHERE sn = ?1", params![sn.as_str()])?;
        tx.commit()?;
        if n > 0 {
            info!(sn = %sn, "license force-deleted");
        }
        Ok(n > 0)
    }

    /// Deletes disabled licenses that were never activated or bound.
    pub fn purge_unused_disabled(&self) -> StoreResult<usize> {
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM licenses
             WHERE is_active = 0 AND usage_count = 0
               AND NOT EXISTS (SELECT 1 FROM bindings b WHERE b.sn = licenses.sn)",
            [],
        )?;
        if n > 0 {
            info!(count = n, "purged unused disabled licenses");
        }
        Ok(n)
    }
}
