//! Support chatbot transcripts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use dewy_core::{ChatRole, UserId};

use crate::{Page, RepositoryError};

/// A chatbot conversation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation with its size and owner, for the back office.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatSessionSummary {
    #[sqlx(flatten)]
    pub session: ChatSession,
    pub user_email: Option<String>,
    pub message_count: i64,
    pub first_message: Option<String>,
}

/// One message in a conversation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub session_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for chat database operations.
pub struct ChatRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ChatRepository<'a> {
    /// Create a new chat repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Start a conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_session(
        &self,
        user_id: Option<UserId>,
    ) -> Result<ChatSession, RepositoryError> {
        let session = sqlx::query_as::<_, ChatSession>(
            r"
            INSERT INTO shop.chat_session (id, user_id) VALUES ($1, $2)
            RETURNING id, user_id, created_at, updated_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        let session = sqlx::query_as::<_, ChatSession>(
            "SELECT id, user_id, created_at, updated_at FROM shop.chat_session WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(session)
    }

    /// Attach a signed-in user to an anonymous conversation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn claim_session(&self, id: Uuid, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.chat_session SET user_id = $2 WHERE id = $1 AND user_id IS NULL")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Append a message and bump the session's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_message(
        &self,
        session_id: Uuid,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, ChatMessage>(
            r"
            INSERT INTO shop.chat_message (session_id, role, content) VALUES ($1, $2, $3)
            RETURNING id, session_id, role, content, created_at
            ",
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE shop.chat_session SET updated_at = now() WHERE id = $1")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// The last `limit` messages, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_messages(
        &self,
        session_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            r"
            SELECT id, session_id, role, content, created_at
            FROM shop.chat_message
            WHERE session_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        messages.reverse();
        Ok(messages)
    }

    /// Every message in a conversation, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r"
            SELECT id, session_id, role, content, created_at
            FROM shop.chat_message
            WHERE session_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(session_id)
        .fetch_all(self.pool)
        .await?;
        Ok(messages)
    }

    /// Conversations with at least one message, most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_sessions(&self, page: Page) -> Result<Vec<ChatSessionSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, ChatSessionSummary>(
            r"
            SELECT s.id, s.user_id, s.created_at, s.updated_at,
                   u.email AS user_email,
                   (SELECT COUNT(*) FROM shop.chat_message m WHERE m.session_id = s.id) AS message_count,
                   (SELECT m.content FROM shop.chat_message m
                     WHERE m.session_id = s.id AND m.role = 'user'
                     ORDER BY m.created_at, m.id LIMIT 1) AS first_message
            FROM shop.chat_session s
            LEFT JOIN shop.user_profile u ON u.id = s.user_id
            WHERE EXISTS (SELECT 1 FROM shop.chat_message m WHERE m.session_id = s.id)
            ORDER BY s.updated_at DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
