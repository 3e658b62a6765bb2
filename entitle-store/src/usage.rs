//! Append-only usage log.

use crate::error::StoreResult;
use crate::pool::Store;
use crate::time::format_timestamp;
use chrono::{DateTime, Utc};
use entitle_types::Sn;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;

/// One accepted usage report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub id: i64,
    pub sn: Sn,
    pub used_credits: f64,
    /// Raw stored receipt time. Kept as text: rows written by other tooling
    /// may not parse, and callers decide what that means.
    pub reported_at: String,
    pub origin: String,
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<UsageReport> {
    Ok(UsageReport {
        id: row.get(0)?,
        sn: Sn::from_stored(row.get::<_, String>(1)?),
        used_credits: row.get(2)?,
        reported_at: row.get(3)?,
        origin: row.get(4)?,
    })
}

impl Store {
    /// Most recent report for an SN by receipt time. Unparsable times sort last.
    pub fn last_usage_report(&self, sn: &Sn) -> StoreResult<Option<UsageReport>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, sn, used_credits, reported_at, origin FROM usage_log
                 WHERE sn = ?1 ORDER BY datetime(reported_at) DESC, id DESC LIMIT 1",
                params![sn.as_str()],
                report_from_row,
            )
            .optional()?)
    }

    /// All reports for an SN, oldest first.
    pub fn usage_reports(&self, sn: &Sn) -> StoreResult<Vec<UsageReport>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, sn, used_credits, reported_at, origin FROM usage_log
             WHERE sn = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![sn.as_str()], report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Appends a report and raises the license's used credits to at least
    /// `used_credits`. Both writes commit together.
    pub fn record_usage_report(
        &self,
        sn: &Sn,
        used_credits: f64,
        origin: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO usage_log (sn, used_credits, reported_at, origin) VALUES (?1, ?2, ?3, ?4)",
            params![sn.as_str(), used_credits, format_timestamp(now), origin],
        )?;
        tx.execute(
            "UPDATE licenses SET used_credits = MAX(used_credits, ?1) WHERE sn = ?2",
            params![used_credits, sn.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Appends a raw log row without touching the license. For importing
    /// history from other systems.
    pub fn import_usage_report(
        &self,
        sn: &Sn,
        used_credits: f64,
        reported_at: &str,
        origin: &str,
    ) -> StoreResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO usage_log (sn, used_credits, reported_at, origin) VALUES (?1, ?2, ?3, ?4)",
            params![sn.as_str(), used_credits, reported_at, origin],
        )?;
        Ok(conn.last_insert_rowid())
    }
}
