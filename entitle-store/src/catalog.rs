//! Groups, provider credentials and products.

use crate::error::StoreResult;
use crate::licenses::non_empty;
use crate::pool::Store;
use crate::schema::{DEFAULT_PRODUCT_ID, DEFAULT_PRODUCT_NAME};
use crate::time::format_timestamp;
use chrono::{DateTime, Utc};
use entitle_types::{ProviderFamily, TrustTier};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::collections::BTreeMap;

/// An organizational (trust) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseGroup {
    pub id: String,
    pub name: String,
    pub trust_level: TrustTier,
    pub llm_group_id: Option<String>,
    pub search_group_id: Option<String>,
}

/// A backend credential set, valid for a `YYYY-MM-DD` date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderConfig {
    pub id: i64,
    pub family: ProviderFamily,
    pub name: String,
    pub provider_type: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub is_active: bool,
    /// Empty means open towards the past.
    pub start_date: String,
    /// Empty means open towards the future.
    pub end_date: String,
    pub group_id: Option<String>,
}

/// Fields for creating a provider config.
#[derive(Debug, Clone)]
pub struct NewProviderConfig {
    pub family: ProviderFamily,
    pub name: String,
    pub provider_type: String,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub is_active: bool,
    pub start_date: String,
    pub end_date: String,
    pub group_id: Option<String>,
}

impl NewProviderConfig {
    #[must_use]
    pub fn new(family: ProviderFamily, provider_type: &str, api_key: &str) -> Self {
        Self {
            family,
            name: String::new(),
            provider_type: provider_type.to_string(),
            base_url: String::new(),
            api_key: api_key.to_string(),
            model: String::new(),
            is_active: true,
            start_date: String::new(),
            end_date: String::new(),
            group_id: None,
        }
    }
}

/// A product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// A typed product metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    Number(f64),
    Text(String),
}

impl ExtraValue {
    fn value_type(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }

    fn stored(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

pub(crate) fn ensure_license_group_row(
    conn: &Connection,
    id: &str,
    name: &str,
    tier: TrustTier,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO license_groups (id, name, trust_level, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![id, name, tier.as_str(), format_timestamp(now)],
    )?;
    Ok(())
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<LicenseGroup> {
    let tier: String = row.get(2)?;
    Ok(LicenseGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        trust_level: TrustTier::from_stored(&tier),
        llm_group_id: non_empty(row.get(3)?),
        search_group_id: non_empty(row.get(4)?),
    })
}

fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<ProviderConfig> {
    let family_raw: String = row.get(1)?;
    let family = family_raw.parse::<ProviderFamily>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ProviderConfig {
        id: row.get(0)?,
        family,
        name: row.get(2)?,
        provider_type: row.get(3)?,
        base_url: row.get(4)?,
        api_key: row.get(5)?,
        model: row.get(6)?,
        is_active: row.get(7)?,
        start_date: row.get(8)?,
        end_date: row.get(9)?,
        group_id: non_empty(row.get(10)?),
    })
}

impl Store {
    // ── License groups ───────────────────────────────────────────

    /// Creates or replaces an organizational group.
    pub fn upsert_license_group(&self, group: &LicenseGroup, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO license_groups (id, name, trust_level, llm_group_id, search_group_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                trust_level = excluded.trust_level,
                llm_group_id = excluded.llm_group_id,
                search_group_id = excluded.search_group_id",
            params![
                group.id,
                group.name,
                group.trust_level.as_str(),
                non_empty(group.llm_group_id.clone()),
                non_empty(group.search_group_id.clone()),
                format_timestamp(now),
            ],
        )?;
        Ok(())
    }

    pub fn get_license_group(&self, id: &str) -> StoreResult<Option<LicenseGroup>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, name, trust_level, llm_group_id, search_group_id
                 FROM license_groups WHERE id = ?1",
                params![id],
                group_from_row,
            )
            .optional()?)
    }

    // ── Provider groups and configs ──────────────────────────────

    /// Creates or renames a provider group.
    pub fn upsert_provider_group(&self, family: ProviderFamily, id: &str, name: &str) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO provider_groups (family, id, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(family, id) DO UPDATE SET name = excluded.name",
            params![family.as_str(), id, name],
        )?;
        Ok(())
    }

    /// Inserts a provider config, returning its id.
    pub fn insert_provider_config(&self, config: &NewProviderConfig) -> StoreResult<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO provider_configs (family, name, provider_type, base_url, api_key, model,
                 is_active, start_date, end_date, group_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                config.family.as_str(),
                config.name,
                config.provider_type,
                config.base_url,
                config.api_key,
                config.model,
                config.is_active,
                config.start_date.trim(),
                config.end_date.trim(),
                non_empty(config.group_id.clone()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_provider_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE provider_configs SET is_active = ?1 WHERE id = ?2",
            params![active, id],
        )?;
        Ok(n > 0)
    }

    /// Configs of one family, restricted to `group` when given, else all.
    pub fn provider_configs(
        &self,
        family: ProviderFamily,
        group: Option<&str>,
    ) -> StoreResult<Vec<ProviderConfig>> {
        let conn = self.conn();
        let base = "SELECT id, family, name, provider_type, base_url, api_key, model, is_active,
                           start_date, end_date, group_id
                    FROM provider_configs WHERE family = ?1";
        let rows = match group.filter(|g| !g.is_empty()) {
            Some(g) => {
                let mut stmt = conn.prepare(&format!("{base} AND group_id = ?2 ORDER BY id"))?;
                let rows = stmt
                    .query_map(params![family.as_str(), g], provider_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!("{base} ORDER BY id"))?;
                let rows = stmt
                    .query_map(params![family.as_str()], provider_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    // ── Products ─────────────────────────────────────────────────

    pub fn upsert_product(&self, product: &Product, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO products (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, description = excluded.description",
            params![product.id, product.name, product.description, format_timestamp(now)],
        )?;
        Ok(())
    }

    pub fn get_product(&self, id: i64) -> StoreResult<Option<Product>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, name, description FROM products WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Product {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Display name for a product, falling back to the default product.
    pub fn product_name(&self, id: i64) -> StoreResult<String> {
        if let Some(p) = self.get_product(id)? {
            return Ok(p.name);
        }
        Ok(self
            .get_product(DEFAULT_PRODUCT_ID)?
            .map(|p| p.name)
            .unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()))
    }

    /// Sets one typed metadata entry on a product.
    pub fn set_product_extra(&self, product_id: i64, key: &str, value: &ExtraValue) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO product_extra_info (product_id, key, value, value_type)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(product_id, key) DO UPDATE SET
                value = excluded.value, value_type = excluded.value_type",
            params![product_id, key, value.stored(), value.value_type()],
        )?;
        Ok(())
    }

    /// Product metadata as JSON values. Unparsable numbers are skipped.
    pub fn product_extra_info(&self, product_id: i64) -> StoreResult<BTreeMap<String, serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT key, value, value_type FROM product_extra_info WHERE product_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![product_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = BTreeMap::new();
        for (key, value, value_type) in rows {
            let typed = if value_type == "number" {
                match value.trim().parse::<f64>() {
                    Ok(n) => ExtraValue::Number(n),
                    Err(_) => continue,
                }
            } else {
                ExtraValue::Text(value)
            };
            out.insert(key, typed.to_json());
        }
        Ok(out)
    }
}
