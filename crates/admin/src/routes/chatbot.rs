//! Support chatbot transcripts.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use dewy_db::chat::{ChatMessage, ChatSession, ChatSessionSummary};
use dewy_db::{ChatRepository, Page, UserRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::AdminPage;
use crate::state::AppState;

const PER_PAGE: i64 = 30;

/// Longest first-message preview shown in the list.
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Deserialize)]
pub struct ChatbotQuery {
    pub page: Option<i64>,
}

/// A conversation row with its first question shortened for the list.
pub struct ChatRow {
    pub summary: ChatSessionSummary,
    pub preview: String,
}

impl From<ChatSessionSummary> for ChatRow {
    fn from(summary: ChatSessionSummary) -> Self {
        let preview = summary
            .first_message
            .as_deref()
            .map_or_else(String::new, |m| truncate(m, PREVIEW_CHARS));
        Self { summary, preview }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "chatbot/index.html")]
pub struct ChatbotIndexTemplate {
    pub page: AdminPage,
    pub sessions: Vec<ChatRow>,
    pub current_page: i64,
    pub has_next: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "chatbot/show.html")]
pub struct ChatbotShowTemplate {
    pub page: AdminPage,
    pub session: ChatSession,
    pub customer_email: Option<String>,
    pub messages: Vec<ChatMessage>,
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head.trim_end())
    } else {
        head
    }
}

/// Conversations, most recently active first.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(query): Query<ChatbotQuery>,
) -> Result<impl IntoResponse> {
    let paging = Page::new(query.page.unwrap_or(1), PER_PAGE);
    let sessions = ChatRepository::new(state.pool())
        .list_sessions(paging)
        .await?;
    let has_next = i64::try_from(sessions.len()).unwrap_or(i64::MAX) >= paging.per_page;

    Ok(ChatbotIndexTemplate {
        page,
        sessions: sessions.into_iter().map(ChatRow::from).collect(),
        current_page: paging.number,
        has_next,
    })
}

/// One transcript.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: AdminPage,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let chat = ChatRepository::new(state.pool());
    let session = chat
        .get_session(session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Conversation".to_string()))?;
    let messages = chat.messages(session_id).await?;

    let customer_email = match session.user_id {
        Some(user_id) => UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .map(|user| user.email.to_string()),
        None => None,
    };

    Ok(ChatbotShowTemplate {
        page,
        session,
        customer_email,
        messages,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("niacinamide serum", 11), "niacinamide…");
        assert_eq!(truncate("crème légère", 5), "crème…");
    }

    #[test]
    fn row_without_messages_has_empty_preview() {
        let now = Utc::now();
        let summary = ChatSessionSummary {
            session: ChatSession {
                id: Uuid::new_v4(),
                user_id: None,
                created_at: now,
                updated_at: now,
            },
            user_email: None,
            message_count: 0,
            first_message: None,
        };
        let row = ChatRow::from(summary);
        assert!(row.preview.is_empty());
    }
}
