//! Support assistant.
//!
//! [`ChatClient`] talks to an `OpenAI`-compatible chat completions endpoint.
//! [`ChatbotService`] wraps it with conversation storage: every user message
//! and reply is persisted so the back office can read transcripts.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use dewy_core::{ChatRole, UserId};
use dewy_db::{ChatRepository, RepositoryError};

use crate::config::ChatConfig;

/// Reply used when no provider is configured or the provider fails.
pub const FALLBACK_REPLY: &str = "Our assistant is offline right now. Please email support@dewy.shop and we'll get back to you within a day.";

/// Longest accepted customer message, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Messages of history sent with each completion.
pub const CONTEXT_MESSAGES: i64 = 10;

const MAX_TOKENS: u32 = 400;

const SYSTEM_PROMPT: &str = "You are Dewy's skincare support assistant. \
Help customers choose products for their skin type, explain ingredients, \
and answer questions about orders, shipping and returns. Shipping is free \
on orders of $499 or more after discounts; otherwise a flat $49 fee applies. \
Customers can cancel orders that are still pending or confirmed from their \
order page. Keep answers short and friendly. You are not a doctor: for \
persistent irritation or medical conditions, recommend seeing a dermatologist. \
If you cannot help, direct the customer to support@dewy.shop.";

/// Errors from the completion provider.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response had no usable content.
    #[error("parse error: {0}")]
    Parse(String),
}

/// A message in the completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatTurn,
}

/// Chat completion client.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ChatClientInner>,
}

struct ChatClientInner {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    model: String,
    api_url: String,
}

impl ChatClient {
    /// Create a client. Without an API key every completion returns
    /// [`FALLBACK_REPLY`] and no request is made.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ChatClientInner {
                client,
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                api_url: config.api_url.clone(),
            }),
        })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.api_key.is_some()
    }

    /// Complete a conversation. `history` excludes the system prompt.
    ///
    /// # Errors
    ///
    /// Returns `ChatError` if the request fails or the response is empty.
    #[instrument(skip(self, history), fields(model = %self.inner.model, turns = history.len()))]
    pub async fn complete(&self, history: &[ChatTurn]) -> Result<String, ChatError> {
        let Some(api_key) = &self.inner.api_key else {
            return Ok(FALLBACK_REPLY.to_string());
        };

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatTurn::new("system", SYSTEM_PROMPT));
        messages.extend_from_slice(history);

        let request = CompletionRequest {
            model: &self.inner.model,
            messages: &messages,
            max_tokens: MAX_TOKENS,
            temperature: 0.4,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.api_url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ChatError::Parse("no choices in response".to_string()))
    }
}

/// Errors from a chatbot exchange.
#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message must be at most {MAX_MESSAGE_LENGTH} characters")]
    MessageTooLong,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The outcome of one exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    pub reply: String,
}

/// Conversation-aware assistant.
pub struct ChatbotService<'a> {
    chats: ChatRepository<'a>,
    client: &'a ChatClient,
}

impl<'a> ChatbotService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, client: &'a ChatClient) -> Self {
        Self {
            chats: ChatRepository::new(pool),
            client,
        }
    }

    /// Store `message`, ask the provider and store the reply.
    ///
    /// An unknown or missing `session_id` starts a new conversation. Provider
    /// failures are logged and answered with [`FALLBACK_REPLY`].
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError` for invalid input or a database failure.
    #[instrument(skip(self, message), fields(session_id))]
    pub async fn respond(
        &self,
        session_id: Option<Uuid>,
        user_id: Option<UserId>,
        message: &str,
    ) -> Result<ChatReply, ChatbotError> {
        let message = validate_message(message)?;

        let session = match session_id {
            Some(id) => self.chats.get_session(id).await?,
            None => None,
        };
        let session_id = match session {
            Some(session) => {
                if session.user_id.is_none()
                    && let Some(user_id) = user_id
                {
                    self.chats.claim_session(session.id, user_id).await?;
                }
                session.id
            }
            None => self.chats.create_session(user_id).await?.id,
        };
        tracing::Span::current().record("session_id", tracing::field::display(session_id));

        self.chats
            .add_message(session_id, ChatRole::User, message)
            .await?;

        let history: Vec<ChatTurn> = self
            .chats
            .recent_messages(session_id, CONTEXT_MESSAGES)
            .await?
            .into_iter()
            .map(|m| ChatTurn::new(m.role.as_str(), m.content))
            .collect();

        let reply = match self.client.complete(&history).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "chat completion failed, using fallback");
                FALLBACK_REPLY.to_string()
            }
        };

        self.chats
            .add_message(session_id, ChatRole::Assistant, &reply)
            .await?;

        Ok(ChatReply { session_id, reply })
    }
}

fn validate_message(message: &str) -> Result<&str, ChatbotError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ChatbotError::EmptyMessage);
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(ChatbotError::MessageTooLong);
    }
    Ok(message)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, api_key: Option<&str>) -> ChatClient {
        ChatClient::new(&ChatConfig {
            api_key: api_key.map(SecretString::from),
            model: "test-model".to_string(),
            api_url: format!("{}/v1/chat/completions", server.uri()),
        })
        .unwrap()
    }

    fn history() -> Vec<ChatTurn> {
        vec![ChatTurn::new("user", "Is the barrier serum okay for oily skin?")]
    }

    #[test]
    fn message_validation() {
        assert!(matches!(validate_message("  "), Err(ChatbotError::EmptyMessage)));
        assert!(matches!(
            validate_message(&"a".repeat(MAX_MESSAGE_LENGTH + 1)),
            Err(ChatbotError::MessageTooLong)
        ));
        assert_eq!(validate_message("  hello \n").unwrap(), "hello");
        assert!(validate_message(&"é".repeat(MAX_MESSAGE_LENGTH)).is_ok());
    }

    #[tokio::test]
    async fn without_key_returns_fallback_without_calling_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, None);
        assert!(!client.is_enabled());
        assert_eq!(client.complete(&history()).await.unwrap(), FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn sends_system_prompt_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test-123"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "messages": [
                    { "role": "system" },
                    { "role": "user", "content": "Is the barrier serum okay for oily skin?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    { "message": { "role": "assistant", "content": " Yes, it's non-comedogenic. " } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server, Some("sk-test-123"))
            .complete(&history())
            .await
            .unwrap();
        assert_eq!(reply, "Yes, it's non-comedogenic.");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server, Some("sk-test-123"))
            .complete(&history())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Api { status: 429, ref message } if message == "slow down"));
    }

    #[tokio::test]
    async fn empty_choices_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = client(&server, Some("sk-test-123"))
            .complete(&history())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Parse(_)));
    }
}
