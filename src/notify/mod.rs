pub mod smtp;

pub use smtp::SmtpNotifier;

use crate::error::DispatchError;
use crate::peg::alerts::AlertEvent;
use async_trait::async_trait;
use log::{error, info, warn};

/// Outbound channel for alert notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends exactly one notification. Errors are reported, never fatal.
    async fn notify(&self, event: &AlertEvent) -> Result<(), DispatchError>;

    /// Short description of where alerts go, for logs.
    fn destination(&self) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent,
    /// Notifier is not fully configured; nothing was attempted.
    Skipped { missing: Vec<&'static str> },
    Failed(DispatchError),
}

/// Deliver `event` once and classify the result.
pub async fn dispatch(notifier: &dyn Notifier, event: &AlertEvent) -> DispatchOutcome {
    match notifier.notify(event).await {
        Ok(()) => {
            info!("Alert sent to {}", notifier.destination());
            DispatchOutcome::Sent
        }
        Err(DispatchError::ConfigIncomplete { missing }) => {
            warn!(
                "Email configuration incomplete ({} not set). Alert not sent.",
                missing.join(", ")
            );
            DispatchOutcome::Skipped { missing }
        }
        Err(e) => {
            error!("Error sending alert: {}", e);
            DispatchOutcome::Failed(e)
        }
    }
}
