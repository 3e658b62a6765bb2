//! The mail collaborator and the post-binding SN notice.

use crate::error::NotifyResult;
use crate::template::sn_issued_message;
use async_trait::async_trait;
use entitle_license::IssuedSn;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Delivers one HTML email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> NotifyResult<()>;
}

/// A mailer that only logs. Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> NotifyResult<()> {
        info!(to, subject, bytes = html_body.len(), "mail (log only)");
        Ok(())
    }
}

/// Sends the SN notice for a fresh binding in the background.
///
/// Failures are logged and dropped; the binding stands either way.
pub fn dispatch_sn_email(mailer: Arc<dyn Mailer>, issued: IssuedSn) -> JoinHandle<()> {
    tokio::spawn(async move {
        let (subject, body) =
            sn_issued_message(&issued.product_name, issued.sn.as_str(), issued.valid_days);
        if let Err(e) = mailer.send(&issued.email, &subject, &body).await {
            warn!(email = %issued.email, sn = %issued.sn, error = %e, "SN email not delivered");
        }
    })
}
