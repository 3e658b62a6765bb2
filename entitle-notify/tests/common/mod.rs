//! Shared helpers for notification tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use entitle_notify::{Mailer, NotifyError, NotifyResult, QueueConfig, SendQueue};
use entitle_store::{Store, StoreConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records every send; addresses containing "bounce" fail. When gated,
/// each send waits for a permit first.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Sent>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingMailer {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            gate: Some(gate),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> NotifyResult<()> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if to.contains("bounce") {
            return Err(NotifyError::Mail("mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(Sent {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

/// A mailer that panics on every send.
pub struct PanickingMailer;

#[async_trait]
impl Mailer for PanickingMailer {
    async fn send(&self, _to: &str, _subject: &str, _html_body: &str) -> NotifyResult<()> {
        panic!("transport exploded");
    }
}

pub fn file_store() -> (Arc<Store>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("notify.db"), &StoreConfig::default()).unwrap();
    (Arc::new(store), dir)
}

pub fn fast_config() -> QueueConfig {
    QueueConfig {
        batch_size: 5,
        batch_interval: Duration::from_millis(10),
    }
}

pub fn recipients(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("user{i}@example.com")).collect()
}

/// Waits until the queue has released its slot.
pub async fn wait_idle(queue: &SendQueue) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while queue.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queue did not finish in time");
}

/// Waits until `mailer` has recorded `n` messages.
pub async fn wait_sent(mailer: &RecordingMailer, n: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while mailer.count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("messages were not sent in time");
}
