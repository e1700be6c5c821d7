use thiserror::Error;

/// An outgoing plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Mail collaborator.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

impl<M> Mailer for std::sync::Arc<M>
where
    M: Mailer + ?Sized,
{
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        (**self).send(message)
    }
}

/// Deliver if possible; failures are logged and swallowed.
pub fn send_best_effort(mailer: &dyn Mailer, message: &MailMessage) {
    if let Err(e) = mailer.send(message) {
        tracing::warn!(to = %message.to, subject = %message.subject, error = %e, "mail not delivered");
    }
}
