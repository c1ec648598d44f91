//! Delivery backends.

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::MailError;
use crate::config::ProviderConfig;

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Clone)]
pub(crate) enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Resend {
        client: reqwest::Client,
        api_key: SecretString,
        endpoint: String,
    },
    SendGrid {
        client: reqwest::Client,
        api_key: SecretString,
        endpoint: String,
    },
    Disabled,
}

impl Transport {
    pub(crate) fn new(config: &ProviderConfig) -> Result<Self, MailError> {
        Ok(match config {
            ProviderConfig::Smtp {
                host,
                port,
                username,
                password,
            } => {
                let credentials =
                    Credentials::new(username.clone(), password.expose_secret().to_string());
                let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                    .port(*port)
                    .credentials(credentials)
                    .build();
                Self::Smtp(mailer)
            }
            ProviderConfig::Resend { api_key, endpoint } => Self::Resend {
                client: http_client()?,
                api_key: api_key.clone(),
                endpoint: endpoint.clone(),
            },
            ProviderConfig::SendGrid { api_key, endpoint } => Self::SendGrid {
                client: http_client()?,
                api_key: api_key.clone(),
                endpoint: endpoint.clone(),
            },
            ProviderConfig::Disabled => Self::Disabled,
        })
    }

    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::Resend { .. } => "resend",
            Self::SendGrid { .. } => "sendgrid",
            Self::Disabled => "disabled",
        }
    }

    pub(crate) async fn send(&self, from: &str, email: &OutgoingEmail) -> Result<(), MailError> {
        match self {
            Self::Smtp(mailer) => {
                let message = Message::builder()
                    .from(
                        from.parse()
                            .map_err(|_| MailError::InvalidAddress(from.to_string()))?,
                    )
                    .to(email
                        .to
                        .parse()
                        .map_err(|_| MailError::InvalidAddress(email.to.clone()))?)
                    .subject(&email.subject)
                    .multipart(
                        MultiPart::alternative()
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_PLAIN)
                                    .body(email.text.clone()),
                            )
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_HTML)
                                    .body(email.html.clone()),
                            ),
                    )?;
                mailer.send(message).await?;
                Ok(())
            }
            Self::Resend {
                client,
                api_key,
                endpoint,
            } => {
                let body = json!({
                    "from": from,
                    "to": [email.to],
                    "subject": email.subject,
                    "text": email.text,
                    "html": email.html,
                });
                post_json(client, endpoint, api_key, &body).await
            }
            Self::SendGrid {
                client,
                api_key,
                endpoint,
            } => {
                let body = json!({
                    "personalizations": [{ "to": [{ "email": email.to }] }],
                    "from": { "email": bare_address(from) },
                    "subject": email.subject,
                    "content": [
                        { "type": "text/plain", "value": email.text },
                        { "type": "text/html", "value": email.html },
                    ],
                });
                post_json(client, endpoint, api_key, &body).await
            }
            Self::Disabled => {
                tracing::info!(to = %email.to, subject = %email.subject, "email disabled, skipping send");
                Ok(())
            }
        }
    }
}

fn http_client() -> Result<reqwest::Client, MailError> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()?)
}

async fn post_json(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &SecretString,
    body: &serde_json::Value,
) -> Result<(), MailError> {
    let response = client
        .post(endpoint)
        .bearer_auth(api_key.expose_secret())
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(MailError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(())
}

/// `Dewy <hello@dewy.shop>` -> `hello@dewy.shop`.
fn bare_address(from: &str) -> &str {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from.get(start + 1..end).unwrap_or(from),
        _ => from,
    }
    .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_strips_display_name() {
        assert_eq!(bare_address("Dewy <hello@dewy.shop>"), "hello@dewy.shop");
        assert_eq!(bare_address("hello@dewy.shop"), "hello@dewy.shop");
        assert_eq!(bare_address("broken> <"), "broken> <");
    }
}
