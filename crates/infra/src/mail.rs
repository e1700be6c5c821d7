//! Mail collaborators.
//!
//! Delivery to a real SMTP relay is out of scope; deployments plug one in behind
//! [`crm_auth::Mailer`].

use std::sync::Mutex;

use crm_auth::{MailError, MailMessage, Mailer};

/// Logs recipient and subject only. Bodies carry one-time tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "mail queued (log transport)");
        Ok(())
    }
}

/// Keeps every message in memory (tests/dev).
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    sent: Mutex<Vec<MailMessage>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<MailMessage> {
        self.sent.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Most recent message addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<MailMessage> {
        self.sent
            .lock()
            .ok()
            .and_then(|m| m.iter().rev().find(|msg| msg.to == to).cloned())
    }
}

impl Mailer for InMemoryOutbox {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError("outbox lock poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}

/// Always fails; exercises the swallow-and-log path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Err(MailError("relay unreachable".into()))
    }
}

/// Pull the `token` query value out of a link inside a mail body.
pub fn token_from_body(body: &str) -> Option<String> {
    let start = body.find("token=")? + "token=".len();
    let rest = &body[start..];
    let end = rest
        .find(|c: char| c == '&' || c.is_whitespace())
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}
