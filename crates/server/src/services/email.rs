//! Activation email notifier.
//!
//! SMTP delivery via lettre with Askama HTML/text templates. Message
//! construction is synchronous and its failure propagates to the caller;
//! the actual send runs on a background task, so callers only ever
//! observe that a notification was scheduled, never that it was
//! delivered.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use gatehouse_core::Email;

use crate::config::EmailConfig;

/// Kinds of transactional email this server sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailTemplate {
    /// First-time account activation, and re-sends after expiry.
    ActivateAccount,
}

/// Errors that can occur while scheduling a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build the email message.
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// Dispatches an activation message to a user.
///
/// Failure from `send` means the notification could not be scheduled;
/// delivery itself is fire-and-forget.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        to: &Email,
        display_name: &str,
        template: EmailTemplate,
        activation_url: &str,
        activation_code: &str,
        subject: &str,
    ) -> Result<(), NotificationError>;
}

/// HTML template for the activation email.
#[derive(Template)]
#[template(path = "email/activate_account.html")]
struct ActivateAccountHtml<'a> {
    username: &'a str,
    confirmation_url: &'a str,
    activation_code: &'a str,
}

/// Plain text template for the activation email.
#[derive(Template)]
#[template(path = "email/activate_account.txt")]
struct ActivateAccountText<'a> {
    username: &'a str,
    confirmation_url: &'a str,
    activation_code: &'a str,
}

/// SMTP-backed [`Notifier`].
#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    /// Create a new notifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        to: &Email,
        display_name: &str,
        template: EmailTemplate,
        activation_url: &str,
        activation_code: &str,
        subject: &str,
    ) -> Result<(), NotificationError> {
        let (text, html) = match template {
            EmailTemplate::ActivateAccount => (
                ActivateAccountText {
                    username: display_name,
                    confirmation_url: activation_url,
                    activation_code,
                }
                .render()?,
                ActivateAccountHtml {
                    username: display_name,
                    confirmation_url: activation_url,
                    activation_code,
                }
                .render()?,
            ),
        };

        let recipient = Mailbox::new(
            Some(display_name.to_owned()),
            to.as_str()
                .parse()
                .map_err(|_| NotificationError::InvalidAddress(to.to_string()))?,
        );

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotificationError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(recipient)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        // Fire-and-forget: delivery outcome is only ever logged.
        let mailer = self.mailer.clone();
        let to_address = to.to_string();
        tokio::spawn(async move {
            if let Err(err) = mailer.send(message).await {
                tracing::error!(to = %to_address, error = %err, "activation email delivery failed");
            }
        });

        tracing::info!(to = %to, subject = %subject, "activation email scheduled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_templates_carry_the_code() {
        let html = ActivateAccountHtml {
            username: "Ada Lovelace",
            confirmation_url: "https://example.com/activate",
            activation_code: "123456",
        }
        .render()
        .expect("html template renders");
        let text = ActivateAccountText {
            username: "Ada Lovelace",
            confirmation_url: "https://example.com/activate",
            activation_code: "123456",
        }
        .render()
        .expect("text template renders");

        for body in [&html, &text] {
            assert!(body.contains("123456"));
            assert!(body.contains("Ada Lovelace"));
            assert!(body.contains("https://example.com/activate"));
        }
    }
}
