//! Persisted notification tasks and their recipient items.

use crate::error::{StoreError, StoreResult};
use crate::pool::Store;
use crate::time::{format_timestamp, opt_timestamp_column, timestamp_column};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Task lifecycle: `running` → `completed` | `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Cancelled,
}

/// Item lifecycle: `pending` → `sent` | `failed` | `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

macro_rules! status_text {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(StoreError::InvalidData(format!(
                        concat!("unknown ", stringify!($ty), " {:?}"),
                        other
                    ))),
                }
            }
        }
    };
}

status_text!(TaskStatus {
    Running => "running",
    Completed => "completed",
    Cancelled => "cancelled",
});

status_text!(ItemStatus {
    Pending => "pending",
    Sent => "sent",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Task header with running counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyTask {
    pub id: i64,
    pub subject: String,
    pub body: String,
    /// Product whose SNs are referenced; `None` uses each recipient's first binding.
    pub product_id: Option<i64>,
    pub total_count: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One recipient of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyItem {
    pub id: i64,
    pub task_id: i64,
    pub email: String,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Item totals per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
}

fn parse_status<T: FromStr<Err = StoreError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: StoreError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<NotifyTask> {
    let product_id: i64 = row.get(3)?;
    Ok(NotifyTask {
        id: row.get(0)?,
        subject: row.get(1)?,
        body: row.get(2)?,
        product_id: (product_id >= 0).then_some(product_id),
        total_count: row.get(4)?,
        sent_count: row.get(5)?,
        failed_count: row.get(6)?,
        status: parse_status(row, 7)?,
        created_at: timestamp_column(row, 8)?,
        completed_at: opt_timestamp_column(row, 9)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<NotifyItem> {
    Ok(NotifyItem {
        id: row.get(0)?,
        task_id: row.get(1)?,
        email: row.get(2)?,
        status: parse_status(row, 3)?,
        error: row.get(4)?,
        sent_at: opt_timestamp_column(row, 5)?,
    })
}

impl Store {
    /// Creates a running task with one pending item per recipient.
    pub fn create_notify_task(
        &self,
        subject: &str,
        body: &str,
        product_id: Option<i64>,
        recipients: &[String],
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO notify_tasks (subject, body, product_id, total_count, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
            params![
                subject,
                body,
                product_id.unwrap_or(-1),
                recipients.len() as i64,
                format_timestamp(now),
            ],
        )?;
        let task_id = tx.last_insert_rowid();
        {
            let mut stmt =
                tx.prepare("INSERT INTO notify_items (task_id, email) VALUES (?1, ?2)")?;
            for email in recipients {
                stmt.execute(params![task_id, email])?;
            }
        }
        tx.commit()?;
        info!(task_id, recipients = recipients.len(), "notification task created");
        Ok(task_id)
    }

    pub fn get_notify_task(&self, task_id: i64) -> StoreResult<Option<NotifyTask>> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, subject, body, product_id, total_count, sent_count, failed_count,
                        status, created_at, completed_at
                 FROM notify_tasks WHERE id = ?1",
                params![task_id],
                task_from_row,
            )
            .optional()?)
    }

    /// Up to `limit` pending items, in insertion order.
    pub fn pending_notify_items(&self, task_id: i64, limit: usize) -> StoreResult<Vec<NotifyItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, email, status, error, sent_at FROM notify_items
             WHERE task_id = ?1 AND status = 'pending' ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![task_id, limit as i64], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn notify_items(&self, task_id: i64) -> StoreResult<Vec<NotifyItem>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, task_id, email, status, error, sent_at FROM notify_items
             WHERE task_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![task_id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Marks a pending item sent and bumps the task's sent counter.
    pub fn mark_notify_item_sent(&self, item: &NotifyItem, now: DateTime<Utc>) -> StoreResult<()> {
        self.finish_notify_item(item, ItemStatus::Sent, None, now)
    }

    /// Marks a pending item failed and bumps the task's failed counter.
    pub fn mark_notify_item_failed(
        &self,
        item: &NotifyItem,
        error: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.finish_notify_item(item, ItemStatus::Failed, Some(error), now)
    }

    fn finish_notify_item(
        &self,
        item: &NotifyItem,
        status: ItemStatus,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let counter = match status {
            ItemStatus::Sent => "sent_count",
            ItemStatus::Failed => "failed_count",
            other => {
                return Err(StoreError::InvalidData(format!(
                    "item cannot be finished as {other}"
                )));
            }
        };
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let n = tx.execute(
            "UPDATE notify_items SET status = ?1, error = ?2, sent_at = ?3
             WHERE id = ?4 AND status = 'pending'",
            params![status.as_str(), error, format_timestamp(now), item.id],
        )?;
        if n > 0 {
            tx.execute(
                &format!("UPDATE notify_tasks SET {counter} = {counter} + 1 WHERE id = ?1"),
                params![item.task_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Cancels every still-pending item and the task itself. Items already
    /// sent or failed are left as they are. Returns the number cancelled.
    pub fn cancel_notify_task(&self, task_id: i64, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let n = tx.execute(
            "UPDATE notify_items SET status = 'cancelled' WHERE task_id = ?1 AND status = 'pending'",
            params![task_id],
        )?;
        tx.execute(
            "UPDATE notify_tasks SET status = 'cancelled', completed_at = ?1 WHERE id = ?2",
            params![format_timestamp(now), task_id],
        )?;
        tx.commit()?;
        info!(task_id, cancelled_items = n, "notification task cancelled");
        Ok(n)
    }

    /// Marks a running task completed. A cancelled task stays cancelled.
    pub fn complete_notify_task(&self, task_id: i64, now: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE notify_tasks SET status = 'completed', completed_at = ?1
             WHERE id = ?2 AND status = 'running'",
            params![format_timestamp(now), task_id],
        )?;
        Ok(())
    }

    pub fn notify_item_counts(&self, task_id: i64) -> StoreResult<ItemCounts> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM notify_items WHERE task_id = ?1 GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = ItemCounts::default();
        for (status, n) in rows {
            match status.parse::<ItemStatus>()? {
                ItemStatus::Pending => counts.pending = n,
                ItemStatus::Sent => counts.sent = n,
                ItemStatus::Failed => counts.failed = n,
                ItemStatus::Cancelled => counts.cancelled = n,
            }
        }
        Ok(counts)
    }

    /// Cancels tasks left `running` by a previous process. No worker owns
    /// them any more, so they would block nothing but also never finish.
    pub fn recover_interrupted_notify_tasks(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let ids: Vec<i64> = {
            let conn = self.conn();
            let mut stmt = conn.prepare("SELECT id FROM notify_tasks WHERE status = 'running'")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };
        for id in &ids {
            warn!(task_id = id, "cancelling notification task interrupted by restart");
            self.cancel_notify_task(*id, now)?;
        }
        Ok(ids.len())
    }
}
