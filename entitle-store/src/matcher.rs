//! SN inventory matcher.
//!
//! [`SnCriteria`] is a plain value describing which unbound license a claim
//! may take. It renders to a single SQL predicate so the exact same rule is
//! evaluated inside the claim transaction and in read-only lookups.
//!
//! Eligibility: active, not expired (or no expiry yet), never activated, no
//! binding. Ordering: licenses without an expiry first, then oldest first.

use crate::error::StoreResult;
use crate::pool::Store;
use crate::time::format_timestamp;
use chrono::{DateTime, Utc};
use entitle_types::Sn;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::debug;

/// Constraints for picking one unbound license.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnCriteria {
    /// `> 0` matches exactly that product; `<= 0` matches the default product.
    pub product_id: i64,
    /// Required LLM provider group, if any.
    pub llm_group: Option<String>,
    /// Required search provider group, if any.
    pub search_group: Option<String>,
    /// Skip licenses tied to any provider group. Only honored when no
    /// group is required.
    pub exclude_grouped: bool,
    /// Skip the built-in free and open-source pools.
    pub exclude_free_pools: bool,
}

impl SnCriteria {
    #[must_use]
    pub fn for_product(product_id: i64) -> Self {
        Self {
            product_id,
            ..Self::default()
        }
    }

    /// Sets the provider groups; empty strings count as "no group".
    #[must_use]
    pub fn with_groups(mut self, llm: Option<&str>, search: Option<&str>) -> Self {
        self.llm_group = llm.filter(|g| !g.is_empty()).map(str::to_string);
        self.search_group = search.filter(|g| !g.is_empty()).map(str::to_string);
        self
    }

    #[must_use]
    pub fn excluding_grouped(mut self, exclude: bool) -> Self {
        self.exclude_grouped = exclude;
        self
    }

    #[must_use]
    pub fn excluding_free_pools(mut self, exclude: bool) -> Self {
        self.exclude_free_pools = exclude;
        self
    }

    fn applies_grouped_exclusion(&self) -> bool {
        self.exclude_grouped && self.llm_group.is_none() && self.search_group.is_none()
    }

    /// The second-pass criteria used when the first finds nothing.
    ///
    /// Only the grouped exclusion is relaxed; every other filter stays.
    #[must_use]
    pub fn relaxed(&self) -> Option<Self> {
        self.applies_grouped_exclusion().then(|| Self {
            exclude_grouped: false,
            ..self.clone()
        })
    }

    /// Renders the selection query and its positional parameters.
    #[must_use]
    pub fn to_sql(&self, now: DateTime<Utc>) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT sn FROM licenses
             WHERE is_active = 1
               AND (expires_at IS NULL OR datetime(expires_at) > datetime(?))
               AND usage_count = 0
               AND NOT EXISTS (SELECT 1 FROM bindings b WHERE b.sn = licenses.sn)",
        );
        let mut params = vec![Value::Text(format_timestamp(now))];

        if self.product_id > 0 {
            sql.push_str(" AND product_id = ?");
            params.push(Value::Integer(self.product_id));
        } else {
            sql.push_str(" AND (product_id IS NULL OR product_id = 0)");
        }

        if let Some(group) = &self.llm_group {
            sql.push_str(" AND llm_group_id = ?");
            params.push(Value::Text(group.clone()));
        }
        if let Some(group) = &self.search_group {
            sql.push_str(" AND search_group_id = ?");
            params.push(Value::Text(group.clone()));
        }

        if self.applies_grouped_exclusion() {
            sql.push_str(
                " AND COALESCE(llm_group_id, '') = '' AND COALESCE(search_group_id, '') = ''",
            );
        }

        if self.exclude_free_pools {
            sql.push_str(
                " AND COALESCE(license_group_id, '') NOT LIKE 'free\\_%' ESCAPE '\\'
                  AND COALESCE(license_group_id, '') NOT LIKE 'oss\\_%' ESCAPE '\\'",
            );
        }

        sql.push_str(" ORDER BY expires_at IS NULL DESC, datetime(created_at) ASC, rowid ASC LIMIT 1");
        (sql, params)
    }
}

fn select_once(conn: &Connection, criteria: &SnCriteria, now: DateTime<Utc>) -> StoreResult<Option<Sn>> {
    let (sql, params) = criteria.to_sql(now);
    let sn = conn
        .query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, String>(0))
        .optional()?;
    Ok(sn.map(Sn::from_stored))
}

/// Selects one eligible SN, retrying once without the grouped exclusion.
pub(crate) fn select_candidate(
    conn: &Connection,
    criteria: &SnCriteria,
    now: DateTime<Utc>,
) -> StoreResult<Option<Sn>> {
    if let Some(sn) = select_once(conn, criteria, now)? {
        return Ok(Some(sn));
    }
    match criteria.relaxed() {
        Some(relaxed) => {
            debug!(product_id = criteria.product_id, "no ungrouped inventory, retrying with grouped");
            select_once(conn, &relaxed, now)
        }
        None => Ok(None),
    }
}

impl Store {
    /// Returns the SN a claim with these criteria would take right now,
    /// without claiming it.
    pub fn peek_available_sn(
        &self,
        criteria: &SnCriteria,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Sn>> {
        let conn = self.conn();
        select_candidate(&conn, criteria, now)
    }
}
