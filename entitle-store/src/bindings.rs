//! Email bindings and the claim transactions.
//!
//! A claim runs as one `BEGIN IMMEDIATE` transaction: the existing-binding
//! check, orphan cleanup, candidate selection and both writes all happen
//! while this connection holds SQLite's write lock, so two concurrent claims
//! can never pick the same SN or bind the same (email, product, kind) twice.
//! The unique index on `bindings.sn` backs this at the schema level.

use crate::catalog::ensure_license_group_row;
use crate::error::{StoreError, StoreResult};
use crate::licenses::{NewLicense, insert_license_row};
use crate::matcher::{SnCriteria, select_candidate};
use crate::pool::Store;
use crate::time::{format_timestamp, parse_timestamp, timestamp_column};
use chrono::{DateTime, Duration, Utc};
use entitle_types::{BindingKind, Sn};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Validity given to minted free and open-source licenses (about a century).
pub const FREE_VALID_DAYS: i64 = 36500;

/// An (email, product, kind) → SN association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub id: i64,
    pub email: String,
    pub sn: Sn,
    pub origin: String,
    pub product_id: i64,
    pub kind: BindingKind,
    pub created_at: DateTime<Utc>,
}

/// Who is claiming.
#[derive(Debug, Clone)]
pub struct Claimant {
    /// Already normalized (trimmed, lower-case).
    pub email: String,
    /// Client network address.
    pub origin: String,
    pub product_id: i64,
}

/// Result of claiming commercial inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// A fresh SN was bound.
    Claimed {
        sn: Sn,
        expires_at: DateTime<Utc>,
        valid_days: i64,
    },
    /// The claimant already holds a live SN for this product.
    AlreadyBound(Sn),
    /// No eligible inventory.
    Exhausted,
}

/// Result of minting a free or open-source SN.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueOutcome {
    Issued { sn: Sn, expires_at: DateTime<Utc> },
    /// The claimant already holds an SN of this kind for this product.
    Existing(Sn),
}

const BINDING_COLUMNS: &str = "id, email, sn, origin, product_id, kind, created_at";

fn binding_from_row(row: &Row<'_>) -> rusqlite::Result<Binding> {
    let kind_raw: String = row.get(5)?;
    let kind = kind_raw.parse::<BindingKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Binding {
        id: row.get(0)?,
        email: row.get(1)?,
        sn: Sn::from_stored(row.get::<_, String>(2)?),
        origin: row.get(3)?,
        product_id: row.get(4)?,
        kind,
        created_at: timestamp_column(row, 6)?,
    })
}

/// SN of the binding for this key, if its license still exists.
fn live_binding_sn(
    conn: &Connection,
    email: &str,
    product_id: i64,
    kind: BindingKind,
) -> StoreResult<Option<Sn>> {
    let sn = conn
        .query_row(
            "SELECT b.sn FROM bindings b JOIN licenses l ON l.sn = b.sn
             WHERE b.email = ?1 AND b.product_id = ?2 AND b.kind = ?3",
            params![email, product_id, kind.as_str()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(sn.map(Sn::from_stored))
}

/// Removes a binding for this key whose license no longer exists.
fn delete_orphan_binding(
    conn: &Connection,
    email: &str,
    product_id: i64,
    kind: BindingKind,
) -> StoreResult<usize> {
    let n = conn.execute(
        "DELETE FROM bindings
         WHERE email = ?1 AND product_id = ?2 AND kind = ?3
           AND NOT EXISTS (SELECT 1 FROM licenses l WHERE l.sn = bindings.sn)",
        params![email, product_id, kind.as_str()],
    )?;
    if n > 0 {
        debug!(email, product_id, kind = %kind, "removed orphaned binding");
    }
    Ok(n)
}

fn insert_binding_row(
    conn: &Connection,
    claimant: &Claimant,
    sn: &Sn,
    kind: BindingKind,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO bindings (email, sn, origin, product_id, kind, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            claimant.email,
            sn.as_str(),
            claimant.origin,
            claimant.product_id,
            kind.as_str(),
            format_timestamp(now),
        ],
    )?;
    Ok(())
}

/// Stamps expiry on first binding and records the claimant in the description.
fn stamp_claimed(
    conn: &Connection,
    sn: &Sn,
    email: &str,
    now: DateTime<Utc>,
) -> StoreResult<(DateTime<Utc>, i64)> {
    let (expires_raw, valid_days): (Option<String>, i64) = conn.query_row(
        "SELECT expires_at, valid_days FROM licenses WHERE sn = ?1",
        params![sn.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let description = format!("Email request: {email}");

    let existing = expires_raw.as_deref().filter(|s| !s.trim().is_empty());
    let expires_at = match existing {
        Some(raw) => parse_timestamp(raw)
            .ok_or_else(|| StoreError::InvalidData(format!("license {sn} has expiry {raw:?}")))?,
        None => {
            let expires_at = Duration::try_days(valid_days)
                .and_then(|days| now.checked_add_signed(days))
                .ok_or_else(|| {
                    StoreError::InvalidData(format!("license {sn} has valid_days {valid_days}"))
                })?;
            conn.execute(
                "UPDATE licenses SET expires_at = ?1 WHERE sn = ?2",
                params![format_timestamp(expires_at), sn.as_str()],
            )?;
            expires_at
        }
    };
    conn.execute(
        "UPDATE licenses SET description = ?1 WHERE sn = ?2",
        params![description, sn.as_str()],
    )?;
    Ok((expires_at, valid_days))
}

impl Store {
    // ── Claims ───────────────────────────────────────────────────

    /// Binds one eligible commercial SN to the claimant.
    pub fn claim_license(
        &self,
        claimant: &Claimant,
        criteria: &SnCriteria,
        now: DateTime<Utc>,
    ) -> StoreResult<ClaimOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let kind = BindingKind::Commercial;

        if let Some(sn) = live_binding_sn(&tx, &claimant.email, claimant.product_id, kind)? {
            tx.commit()?;
            return Ok(ClaimOutcome::AlreadyBound(sn));
        }
        delete_orphan_binding(&tx, &claimant.email, claimant.product_id, kind)?;

        let Some(sn) = select_candidate(&tx, criteria, now)? else {
            tx.commit()?;
            warn!(product_id = claimant.product_id, "no available SN");
            return Ok(ClaimOutcome::Exhausted);
        };

        insert_binding_row(&tx, claimant, &sn, kind, now)?;
        let (expires_at, valid_days) = stamp_claimed(&tx, &sn, &claimant.email, now)?;
        tx.commit()?;

        info!(sn = %sn, email = %claimant.email, product_id = claimant.product_id, "SN claimed");
        Ok(ClaimOutcome::Claimed {
            sn,
            expires_at,
            valid_days,
        })
    }

    /// Mints a new SN in the built-in free or open-source pool and binds it.
    ///
    /// `sn` is the freshly generated serial; it is only used when the
    /// claimant does not already hold one of this kind.
    pub fn issue_license(
        &self,
        claimant: &Claimant,
        kind: BindingKind,
        sn: Sn,
        now: DateTime<Utc>,
    ) -> StoreResult<IssueOutcome> {
        let group_id = kind.group_id(claimant.product_id).ok_or_else(|| {
            StoreError::InvalidData(format!("{kind} inventory cannot be minted"))
        })?;

        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(existing) = live_binding_sn(&tx, &claimant.email, claimant.product_id, kind)? {
            tx.commit()?;
            return Ok(IssueOutcome::Existing(existing));
        }
        delete_orphan_binding(&tx, &claimant.email, claimant.product_id, kind)?;

        let group_name = match kind {
            BindingKind::Oss => format!("Open source (product {})", claimant.product_id),
            _ => format!("Free (product {})", claimant.product_id),
        };
        ensure_license_group_row(&tx, &group_id, &group_name, kind.tier(), now)?;

        let expires_at = now + Duration::days(FREE_VALID_DAYS);
        let license = NewLicense {
            valid_days: FREE_VALID_DAYS,
            expires_at: Some(expires_at),
            description: format!("{kind} request: {}", claimant.email),
            daily_analysis: 0,
            product_id: claimant.product_id,
            license_group_id: Some(group_id),
            ..NewLicense::new(sn.clone())
        };
        insert_license_row(&tx, &license, now)?;
        insert_binding_row(&tx, claimant, &sn, kind, now)?;
        tx.commit()?;

        info!(sn = %sn, email = %claimant.email, kind = %kind, "SN issued");
        Ok(IssueOutcome::Issued { sn, expires_at })
    }

    // ── Lookups ──────────────────────────────────────────────────

    /// Returns the binding for (email, product, kind) if its license exists.
    pub fn live_binding(
        &self,
        email: &str,
        product_id: i64,
        kind: BindingKind,
    ) -> StoreResult<Option<Sn>> {
        let conn = self.conn();
        live_binding_sn(&conn, email, product_id, kind)
    }

    /// All bindings pointing at an SN (at most one while the index holds).
    pub fn bindings_for_sn(&self, sn: &Sn) -> StoreResult<Vec<Binding>> {
        let conn = self.conn();
        let sql = format!("SELECT {BINDING_COLUMNS} FROM bindings WHERE sn = ?1 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sn.as_str()], binding_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The binding a notification to `email` should reference.
    ///
    /// With a product, the first binding for that product; without one, the
    /// email's first binding of any product.
    pub fn recipient_binding(
        &self,
        email: &str,
        product_id: Option<i64>,
    ) -> StoreResult<Option<Binding>> {
        let conn = self.conn();
        let row = match product_id {
            Some(pid) => {
                let sql = format!(
                    "SELECT {BINDING_COLUMNS} FROM bindings
                     WHERE email = ?1 AND product_id = ?2 ORDER BY id LIMIT 1"
                );
                conn.query_row(&sql, params![email, pid], binding_from_row)
                    .optional()?
            }
            None => {
                let sql = format!(
                    "SELECT {BINDING_COLUMNS} FROM bindings WHERE email = ?1 ORDER BY id LIMIT 1"
                );
                conn.query_row(&sql, params![email], binding_from_row)
                    .optional()?
            }
        };
        Ok(row)
    }

    /// Deletes a binding by id.
    pub fn delete_binding(&self, id: i64) -> StoreResult<bool> {
        let conn = self.conn();
        Ok(conn.execute("DELETE FROM bindings WHERE id = ?1", params![id])? > 0)
    }

    /// Distinct emails bound from `origin` on the UTC day `day` (`YYYY-MM-DD`).
    pub fn distinct_emails_for_origin(&self, origin: &str, day: &str) -> StoreResult<i64> {
        let conn = self.conn();
        Ok(conn.query_row(
            "SELECT COUNT(DISTINCT email) FROM bindings
             WHERE origin = ?1 AND date(created_at) = ?2",
            params![origin, day],
            |row| row.get(0),
        )?)
    }
}
