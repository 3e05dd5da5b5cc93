use std::fmt::Display;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use stockwatch_core::TargetConfig;
use stockwatch_logging::{watch_debug, watch_warn};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("no recipients given")]
    NoRecipients,
    #[error("invalid notifier configuration: {0}")]
    Config(String),
    #[error("invalid mail address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("mail delivery failed: {0}")]
    Transport(String),
}

/// How a notifier handled a message it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a mail server for every recipient.
    Delivered,
    /// Only written to the log; nobody was reached.
    LoggedOnly,
}

/// Deliver a "marker is present" message for `target` to `recipients`.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        target: &TargetConfig,
        recipients: &[String],
    ) -> Result<Dispatch, NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub html_body: String,
}

pub fn compose_message(target: &TargetConfig) -> NotificationMessage {
    let title = format!("{}-{} is back in stock!", target.site, target.label);
    let mut html_body = String::new();
    html_body.push_str("<html>\n  <body>\n");
    html_body.push_str(&format!("    <h2>{}</h2>\n", escape_html(&title)));
    html_body.push_str(&format!(
        "    <h3><a href='{}'>View the product page</a></h3>\n",
        escape_html(&target.page_url)
    ));
    if !target.image_url.is_empty() {
        html_body.push_str(&format!(
            "    <p><img src='{}' alt='product image' style='max-width: 500px;'></p>\n",
            escape_html(&target.image_url)
        ));
    }
    html_body.push_str(
        "    <h4><small>This message was sent automatically; please do not reply.</small></h4>\n",
    );
    html_body.push_str("  </body>\n</html>\n");

    NotificationMessage {
        subject: title,
        html_body,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Writes the message to the log instead of delivering it.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        target: &TargetConfig,
        recipients: &[String],
    ) -> Result<Dispatch, NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let message = compose_message(target);
        watch_warn!(
            "No mail transport configured; would notify {:?}: {} ({})",
            recipients,
            message.subject,
            target.page_url
        );
        Ok(Dispatch::LoggedOnly)
    }
}

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Sends the composed message as one HTML mail addressed to all recipients.
pub struct SmtpNotifier<T = AsyncSmtpTransport<Tokio1Executor>> {
    transport: T,
    sender: Mailbox,
}

impl SmtpNotifier {
    /// Authenticated SMTP over implicit TLS (port 465). The login user is
    /// also the sender address.
    pub fn relay(
        host: &str,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let sender = parse_mailbox(user)?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|err| NotifyError::Config(format!("smtp host {host:?}: {err}")))?
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .timeout(Some(timeout))
            .build();
        Ok(Self::with_transport(transport, sender))
    }
}

impl<T> SmtpNotifier<T> {
    pub fn with_transport(transport: T, sender: Mailbox) -> Self {
        Self { transport, sender }
    }
}

pub fn build_email(
    sender: &Mailbox,
    recipients: &[String],
    message: &NotificationMessage,
) -> Result<Message, NotifyError> {
    let mut builder = Message::builder()
        .from(sender.clone())
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML);
    for recipient in recipients {
        builder = builder.to(parse_mailbox(recipient)?);
    }
    builder
        .body(message.html_body.clone())
        .map_err(|err| NotifyError::Message(err.to_string()))
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|err| NotifyError::Address {
            address: address.to_string(),
            reason: err.to_string(),
        })
}

#[async_trait::async_trait]
impl<T> Notifier for SmtpNotifier<T>
where
    T: AsyncTransport + Send + Sync,
    T::Error: Display,
{
    async fn send(
        &self,
        target: &TargetConfig,
        recipients: &[String],
    ) -> Result<Dispatch, NotifyError> {
        if recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let email = build_email(&self.sender, recipients, &compose_message(target))?;
        self.transport
            .send(email)
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        watch_debug!(
            "Mail server accepted message for {:?} about {}",
            recipients,
            target.page_url
        );
        Ok(Dispatch::Delivered)
    }
}
