//! Outbound email for the entitlement server.
//!
//! - [`Mailer`]: the transport seam; [`LogMailer`] stands in when none is set
//! - [`dispatch_sn_email`]: fire-and-forget notice after an SN is bound
//! - [`SendQueue`]: operator broadcasts, one task at a time, in paced batches
//!   with cooperative cancellation

mod error;
mod mailer;
mod queue;
mod template;

pub use error::{NotifyError, NotifyResult};
pub use mailer::{LogMailer, Mailer, dispatch_sn_email};
pub use queue::{
    DEFAULT_BATCH_INTERVAL, DEFAULT_BATCH_SIZE, NewTask, QueueConfig, SendQueue, TaskProgress,
};
pub use template::{EMAIL_VAR, PRODUCT_NAME_VAR, SN_VAR, TemplateVars, render, sn_issued_message};
