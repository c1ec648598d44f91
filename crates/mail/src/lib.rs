//! Transactional email for the Dewy shop.
//!
//! The [`Mailer`] renders askama templates (HTML plus plain text) and hands
//! them to whichever provider `EMAIL_PROVIDER` selects: SMTP through
//! lettre, or the Resend / SendGrid HTTP APIs. With no provider configured
//! every send is logged and skipped, which keeps local development quiet.
//!
//! Email is never on the critical path: request handlers call
//! [`Mailer::dispatch`] after their transaction commits and move on.

#![cfg_attr(not(test), forbid(unsafe_code))]

mod config;
mod messages;
mod transport;

use std::future::Future;

use thiserror::Error;

use dewy_core::OrderStatus;

pub use config::{ConfigError, MailConfig, ProviderConfig, RESEND_ENDPOINT, SENDGRID_ENDPOINT};
pub use messages::{OrderEmail, OrderEmailLine, status_headline};
pub use transport::OutgoingEmail;

use transport::Transport;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Failed to build the MIME message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Sends the shop's transactional email.
#[derive(Clone)]
pub struct Mailer {
    transport: Transport,
    from_address: String,
    admin_notification: Option<String>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("provider", &self.transport.name())
            .field("from_address", &self.from_address)
            .field("admin_notification", &self.admin_notification)
            .finish()
    }
}

impl Mailer {
    /// Build a mailer for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if the SMTP relay or HTTP client cannot be built.
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let transport = Transport::new(&config.provider)?;
        tracing::info!(provider = transport.name(), "mailer ready");
        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
            admin_notification: config.admin_notification.clone(),
        })
    }

    /// A mailer that logs and drops everything.
    #[must_use]
    pub fn disabled() -> Self {
        let config = MailConfig::disabled();
        Self {
            transport: Transport::Disabled,
            from_address: config.from_address,
            admin_notification: None,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.transport, Transport::Disabled)
    }

    /// Send a rendered message.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if the provider rejects or cannot receive it.
    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.transport.send(&self.from_address, email).await?;
        if self.is_enabled() {
            tracing::info!(
                to = %email.to,
                subject = %email.subject,
                provider = self.transport.name(),
                "email sent"
            );
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `MailError` if rendering or sending fails.
    pub async fn send_order_confirmation(
        &self,
        to: &str,
        order: &OrderEmail,
    ) -> Result<(), MailError> {
        self.send(&messages::order_confirmation(to, order)?).await
    }

    /// Alert the shop team about a new order. A no-op when
    /// `ADMIN_NOTIFICATION_EMAIL` is unset.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if rendering or sending fails.
    pub async fn send_admin_new_order(
        &self,
        order: &OrderEmail,
        customer_email: &str,
        admin_url: &str,
    ) -> Result<(), MailError> {
        let Some(to) = self.admin_notification.as_deref() else {
            return Ok(());
        };
        self.send(&messages::admin_new_order(to, order, customer_email, admin_url)?)
            .await
    }

    /// # Errors
    ///
    /// Returns `MailError` if rendering or sending fails.
    pub async fn send_order_status_update(
        &self,
        to: &str,
        name: &str,
        order_number: &str,
        status: OrderStatus,
        note: Option<&str>,
        order_url: &str,
    ) -> Result<(), MailError> {
        self.send(&messages::status_update(
            to,
            name,
            order_number,
            status,
            note,
            order_url,
        )?)
        .await
    }

    /// # Errors
    ///
    /// Returns `MailError` if rendering or sending fails.
    pub async fn send_welcome(&self, to: &str, name: &str, shop_url: &str) -> Result<(), MailError> {
        self.send(&messages::welcome(to, name, shop_url)?).await
    }

    /// Run a send in the background. Failures are logged, never surfaced.
    pub fn dispatch<F>(kind: &'static str, send: F)
    where
        F: Future<Output = Result<(), MailError>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = send.await {
                tracing::warn!(kind, error = %e, "failed to send email");
            }
        });
    }
}
