//! Error types for notification delivery.

use entitle_store::StoreError;
use thiserror::Error;

/// Result type for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors from the mailer and the send queue.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Another task holds the queue.
    #[error("notification task {0} is already running")]
    AlreadyRunning(i64),

    /// Another start holds the reservation and is still writing its task.
    #[error("another notification task is starting")]
    Starting,

    /// The task is not the one currently running.
    #[error("notification task {0} is not running")]
    NotRunning(i64),

    /// Task record vanished from the store.
    #[error("notification task {0} not found")]
    TaskNotFound(i64),

    /// Subject or body is blank.
    #[error("subject and body must not be empty")]
    EmptyMessage,

    /// No usable recipient address.
    #[error("no recipients")]
    NoRecipients,

    /// Transport failure reported by the mailer.
    #[error("mail delivery failed: {0}")]
    Mail(String),

    /// A spawned store call or launch did not run to completion.
    #[error("background task failed: {0}")]
    Background(String),

    /// Storage error.
    #[error(transparent)]
    Store(#[from] StoreError),
}
