//! E-mail delivery over SMTP with STARTTLS.

use crate::config::NotifierConfig;
use crate::error::DispatchError;
use crate::notify::Notifier;
use crate::peg::alerts::AlertEvent;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::debug;
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpNotifier {
    config: NotifierConfig,
}

/// Credentials and addresses, present only when the config is complete.
struct Envelope<'a> {
    sender: &'a str,
    password: &'a str,
    recipient: &'a str,
}

impl SmtpNotifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self { config }
    }

    fn envelope(&self) -> Result<Envelope<'_>, DispatchError> {
        match (
            self.config.sender.as_deref(),
            self.config.password.as_deref(),
            self.config.recipient.as_deref(),
        ) {
            (Some(sender), Some(password), Some(recipient)) => Ok(Envelope {
                sender,
                password,
                recipient,
            }),
            _ => Err(DispatchError::ConfigIncomplete {
                missing: self.config.missing_fields(),
            }),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DispatchError> {
    address.parse().map_err(|e: lettre::address::AddressError| DispatchError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn build_message(envelope: &Envelope<'_>, event: &AlertEvent) -> Result<Message, DispatchError> {
    Message::builder()
        .from(parse_mailbox(envelope.sender)?)
        .to(parse_mailbox(envelope.recipient)?)
        .subject(event.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(event.body.clone())
        .map_err(|e| DispatchError::Message(e.to_string()))
}

fn classify(err: lettre::transport::smtp::Error) -> DispatchError {
    if err.is_permanent() {
        DispatchError::Rejected(err.to_string())
    } else {
        DispatchError::Transport(err.to_string())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), DispatchError> {
        let envelope = self.envelope()?;
        let message = build_message(&envelope, event)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(classify)?
            .port(self.config.smtp_port)
            .timeout(Some(SMTP_TIMEOUT))
            .credentials(Credentials::new(
                envelope.sender.to_string(),
                envelope.password.to_string(),
            ))
            .build();

        debug!(
            "Connecting to {}:{} as {}",
            self.config.smtp_host, self.config.smtp_port, envelope.sender
        );
        let response = mailer.send(message).await.map_err(classify)?;
        debug!("SMTP response: {:?}", response.code());

        Ok(())
    }

    fn destination(&self) -> String {
        self.config
            .recipient
            .clone()
            .unwrap_or_else(|| "<unset>".to_string())
    }
}
