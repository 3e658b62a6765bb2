//! Single-flight background queue for operator notifications.
//!
//! A task moves `running -> completed | cancelled`; each of its items moves
//! `pending -> sent | failed | cancelled`. At most one task runs at a time:
//! the active slot holds its id and the cancellation token for that run, and
//! only the worker that owns the slot clears it. A start reserves the slot
//! before its task row is written and either fills it or gives it back when
//! the write fails.
//!
//! Store calls run on the blocking pool; the slot lock is never held across
//! one.
//!
//! The worker sends items in batches, pausing between batches. Cancellation
//! is cooperative and checked before every batch and every item, and it wakes
//! the pause early. Any fault inside the worker ends the task as `completed`
//! so the slot is always released.

use crate::error::{NotifyError, NotifyResult};
use crate::mailer::Mailer;
use crate::template::{TemplateVars, render};
use entitle_store::{
    DEFAULT_PRODUCT_ID, ItemCounts, NotifyItem, NotifyTask, Store, StoreResult,
};
use entitle_types::{Clock, SystemClock};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Items sent per batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause between batches.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Batch pacing for the worker.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub batch_size: usize,
    pub batch_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: DEFAULT_BATCH_INTERVAL,
        }
    }
}

/// A notification to send.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub subject: String,
    pub body: String,
    pub emails: Vec<String>,
    /// Product whose name and SN fill the template; `None` resolves per recipient.
    pub product_id: Option<i64>,
}

/// A task with live per-status item counts.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub task: NotifyTask,
    pub counts: ItemCounts,
}

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    Completed,
    Cancelled,
}

struct ActiveTask {
    task_id: i64,
    cancel: CancellationToken,
}

enum Slot {
    Idle,
    /// Reserved by a start whose task row is not written yet.
    Starting,
    Running(ActiveTask),
}

/// A `Starting` reservation. Dropped unfilled, it frees the slot again.
struct Reservation {
    inner: Arc<QueueInner>,
    filled: bool,
}

impl Reservation {
    fn fill(mut self, task_id: i64, cancel: CancellationToken) {
        *self.inner.slot() = Slot::Running(ActiveTask { task_id, cancel });
        self.filled = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.filled {
            return;
        }
        let mut slot = self.inner.slot();
        if matches!(*slot, Slot::Starting) {
            *slot = Slot::Idle;
        }
    }
}

struct QueueInner {
    store: Arc<Store>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    active: Mutex<Slot>,
}

/// Handle to the notification queue. Cheap to clone; all clones share one slot.
#[derive(Clone)]
pub struct SendQueue {
    inner: Arc<QueueInner>,
}

impl SendQueue {
    #[must_use]
    pub fn new(store: Arc<Store>, mailer: Arc<dyn Mailer>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                mailer,
                clock: Arc::new(SystemClock),
                config,
                active: Mutex::new(Slot::Idle),
            }),
        }
    }

    /// Replaces the clock used for item and task timestamps.
    #[must_use]
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(QueueInner {
                store: inner.store.clone(),
                mailer: inner.mailer.clone(),
                clock,
                config: inner.config.clone(),
                active: Mutex::new(Slot::Idle),
            }),
        }
    }

    // ── Control ──────────────────────────────────────────────────

    /// Persists a task and starts its worker. Must be called within a Tokio
    /// runtime.
    ///
    /// Recipients are trimmed, lower-cased and de-duplicated. Fails with
    /// [`NotifyError::AlreadyRunning`] while another task holds the queue and
    /// with [`NotifyError::Starting`] while another start is still writing
    /// its task.
    pub async fn start(&self, task: NewTask) -> NotifyResult<i64> {
        if task.subject.trim().is_empty() || task.body.trim().is_empty() {
            return Err(NotifyError::EmptyMessage);
        }
        let recipients = normalize_recipients(&task.emails);
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let reservation = self.inner.reserve()?;
        let inner = self.inner.clone();
        let NewTask {
            subject,
            body,
            product_id,
            ..
        } = task;

        // Runs to completion even if the caller stops waiting.
        let launch = tokio::spawn(async move {
            let count = recipients.len();
            let now = inner.clock.now();
            let task_id = inner
                .with_store(move |store| {
                    store.create_notify_task(&subject, &body, product_id, &recipients, now)
                })
                .await?;

            let cancel = CancellationToken::new();
            reservation.fill(task_id, cancel.clone());
            info!(task_id, recipients = count, "notification task started");
            tokio::spawn(run(inner, task_id, cancel));
            Ok::<_, NotifyError>(task_id)
        });
        launch
            .await
            .map_err(|e| NotifyError::Background(e.to_string()))?
    }

    /// Signals the running task to stop. Its worker marks the remaining
    /// pending items cancelled and then releases the slot.
    pub fn cancel(&self, task_id: i64) -> NotifyResult<()> {
        let slot = self.inner.slot();
        match &*slot {
            Slot::Running(active) if active.task_id == task_id => {
                active.cancel.cancel();
                info!(task_id, "notification task cancellation requested");
                Ok(())
            }
            _ => Err(NotifyError::NotRunning(task_id)),
        }
    }

    /// Id of the task holding the queue, if any.
    #[must_use]
    pub fn active_task(&self) -> Option<i64> {
        match &*self.inner.slot() {
            Slot::Running(active) => Some(active.task_id),
            Slot::Idle | Slot::Starting => None,
        }
    }

    /// True while a task runs or a start holds the reservation.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(*self.inner.slot(), Slot::Idle)
    }

    /// The stored task and its item counts.
    pub async fn progress(&self, task_id: i64) -> NotifyResult<Option<TaskProgress>> {
        self.inner
            .with_store(move |store| {
                let Some(task) = store.get_notify_task(task_id)? else {
                    return Ok(None);
                };
                let counts = store.notify_item_counts(task_id)?;
                Ok(Some(TaskProgress { task, counts }))
            })
            .await
    }
}

impl std::fmt::Debug for SendQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendQueue")
            .field("config", &self.inner.config)
            .field("active_task", &self.active_task())
            .finish()
    }
}

impl QueueInner {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn reserve(self: &Arc<Self>) -> NotifyResult<Reservation> {
        let mut slot = self.slot();
        if let Slot::Running(active) = &*slot {
            return Err(NotifyError::AlreadyRunning(active.task_id));
        }
        if matches!(*slot, Slot::Starting) {
            return Err(NotifyError::Starting);
        }
        *slot = Slot::Starting;
        Ok(Reservation {
            inner: self.clone(),
            filled: false,
        })
    }

    /// Clears the slot if `task_id` still owns it.
    fn release(&self, task_id: i64) {
        let mut slot = self.slot();
        if matches!(&*slot, Slot::Running(active) if active.task_id == task_id) {
            *slot = Slot::Idle;
        }
    }

    /// Runs `work` against the store on the blocking pool.
    async fn with_store<T, F>(&self, work: F) -> NotifyResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> StoreResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| NotifyError::Background(e.to_string()))?;
        Ok(result?)
    }

    /// Resolves template variables for one recipient.
    async fn vars_for(&self, product_id: Option<i64>, email: String) -> NotifyResult<TemplateVars> {
        self.with_store(move |store| {
            let binding = store.recipient_binding(&email, product_id)?;
            let product_id = product_id
                .or_else(|| binding.as_ref().map(|b| b.product_id))
                .unwrap_or(DEFAULT_PRODUCT_ID);
            Ok(TemplateVars {
                product_name: store.product_name(product_id)?,
                email,
                sn: binding.map(|b| b.sn.into_string()).unwrap_or_default(),
            })
        })
        .await
    }

    async fn deliver(&self, task: &NotifyTask, item: NotifyItem) -> NotifyResult<()> {
        let vars = self.vars_for(task.product_id, item.email.clone()).await?;
        let subject = render(&task.subject, &vars);
        let body = render(&task.body, &vars);
        let email = item.email.clone();

        match self.mailer.send(&email, &subject, &body).await {
            Ok(()) => {
                let now = self.clock.now();
                self.with_store(move |store| store.mark_notify_item_sent(&item, now))
                    .await?;
                debug!(task_id = task.id, email = %email, "notification sent");
            }
            Err(e) => {
                let reason = e.to_string();
                let now = self.clock.now();
                let stored = reason.clone();
                self.with_store(move |store| store.mark_notify_item_failed(&item, &stored, now))
                    .await?;
                warn!(task_id = task.id, email = %email, error = %reason, "notification failed");
            }
        }
        Ok(())
    }

    async fn process(&self, task_id: i64, cancel: &CancellationToken) -> NotifyResult<RunEnd> {
        let task = self
            .with_store(move |store| store.get_notify_task(task_id))
            .await?
            .ok_or(NotifyError::TaskNotFound(task_id))?;
        let batch_size = self.config.batch_size.max(1);

        loop {
            if cancel.is_cancelled() {
                return self.cancelled(task_id).await;
            }
            let items = self
                .with_store(move |store| store.pending_notify_items(task_id, batch_size))
                .await?;
            if items.is_empty() {
                let now = self.clock.now();
                self.with_store(move |store| store.complete_notify_task(task_id, now))
                    .await?;
                return Ok(RunEnd::Completed);
            }

            for item in items {
                if cancel.is_cancelled() {
                    return self.cancelled(task_id).await;
                }
                self.deliver(&task, item).await?;
            }

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.config.batch_interval) => {}
            }
        }
    }

    async fn cancelled(&self, task_id: i64) -> NotifyResult<RunEnd> {
        let now = self.clock.now();
        self.with_store(move |store| store.cancel_notify_task(task_id, now))
            .await?;
        Ok(RunEnd::Cancelled)
    }

    /// Ends a faulted run as completed.
    async fn force_complete(&self, task_id: i64) {
        let now = self.clock.now();
        if let Err(e) = self
            .with_store(move |store| store.complete_notify_task(task_id, now))
            .await
        {
            error!(task_id, error = %e, "failed to close faulted notification task");
        }
    }
}

async fn run(inner: Arc<QueueInner>, task_id: i64, cancel: CancellationToken) {
    let outcome = AssertUnwindSafe(inner.process(task_id, &cancel))
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(RunEnd::Completed)) => info!(task_id, "notification task completed"),
        Ok(Ok(RunEnd::Cancelled)) => info!(task_id, "notification task cancelled"),
        Ok(Err(e)) => {
            error!(task_id, error = %e, "notification task aborted");
            inner.force_complete(task_id).await;
        }
        Err(_) => {
            error!(task_id, "notification worker panicked");
            inner.force_complete(task_id).await;
        }
    }
    inner.release(task_id);
}

fn normalize_recipients(emails: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(emails.len());
    for email in emails {
        let email = email.trim().to_lowercase();
        if !email.is_empty() && !out.contains(&email) {
            out.push(email);
        }
    }
    out
}
